use crate::models::Compatibility;

use super::{ParsedVersion, RuntimeKind, RuntimeVersion};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The published minimum versions that honor cgroup v2 limits, one entry per runtime kind.
///
/// Each entry lists one inclusive minimum per supported major line, in ascending order.
pub static COMPATIBILITY_TABLE: [CompatibilityRule; 5] = [
    CompatibilityRule::new(
        RuntimeKind::OpenJdk,
        &[
            RuntimeVersion::new(8, 0, 0, Some(372)),
            RuntimeVersion::new(11, 0, 16, None),
            RuntimeVersion::new(15, 0, 0, None),
        ],
    ),
    CompatibilityRule::new(
        RuntimeKind::Semeru,
        &[
            RuntimeVersion::new(8, 0, 345, Some(1)),
            RuntimeVersion::new(11, 0, 16, Some(0)),
            RuntimeVersion::new(17, 0, 4, Some(0)),
            RuntimeVersion::new(18, 0, 2, Some(0)),
        ],
    ),
    CompatibilityRule::new(RuntimeKind::IbmJava, &[RuntimeVersion::new(8, 0, 7, Some(15))]),
    CompatibilityRule::new(RuntimeKind::Node, &[RuntimeVersion::new(20, 3, 0, None)]),
    CompatibilityRule::new(RuntimeKind::Dotnet, &[RuntimeVersion::new(5, 0, 0, None)]),
];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The minimum versions of one runtime kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompatibilityRule {
    kind: RuntimeKind,
    minimums: &'static [RuntimeVersion],
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CompatibilityRule {
    const fn new(kind: RuntimeKind, minimums: &'static [RuntimeVersion]) -> Self {
        Self { kind, minimums }
    }

    /// The runtime kind this rule applies to.
    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    /// The per-line minimums in ascending order.
    pub fn minimums(&self) -> &'static [RuntimeVersion] {
        self.minimums
    }

    /// Classifies `version` against the nearest listed line at or below its major.
    ///
    /// A listed major must reach that line's minimum. A major between two listed lines, or above
    /// the highest, is newer than a fixed line and compatible. A major below the lowest listed line
    /// is incompatible.
    pub fn classify(&self, version: &RuntimeVersion) -> Compatibility {
        match self
            .minimums
            .iter()
            .rev()
            .find(|minimum| minimum.major() <= version.major())
        {
            Some(minimum) if minimum.major() < version.major() => Compatibility::Yes,
            Some(minimum) if version >= minimum => Compatibility::Yes,
            _ => Compatibility::No,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The rule for `kind`.
pub fn rule_for(kind: RuntimeKind) -> &'static CompatibilityRule {
    COMPATIBILITY_TABLE
        .iter()
        .find(|rule| rule.kind == kind)
        .unwrap_or_else(|| unreachable!("every runtime kind has a rule"))
}

/// Classifies a parsed version of `kind`.
pub fn classify(kind: RuntimeKind, version: &RuntimeVersion) -> Compatibility {
    rule_for(kind).classify(version)
}

/// Classifies a grammar outcome. Unparsed output is never guessed at.
pub fn classify_parsed(parsed: &ParsedVersion) -> Compatibility {
    match parsed {
        ParsedVersion::Parsed { kind, version, .. } => classify(*kind, version),
        ParsedVersion::Unparsed { .. } => Compatibility::NotApplicable,
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
