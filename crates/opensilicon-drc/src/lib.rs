//! # OpenSilicon DRC
//!
//! Design rule checking for OpenSilicon boards.
//!
//! A [`DrcEngine`] combines the rules implied by the board setup and net
//! classes with an optional rule file, compiles them into per-constraint rule
//! sets ordered by specificity, and answers "which constraint applies to these
//! items" queries. Pluggable [`TestProvider`]s sweep the board, ask those
//! questions, and report [`DrcItem`] violations. Large sweeps run on a shared
//! rayon worker pool and honour cancellation.
//!
//! ```text
//! (version 1)
//! (rule "HV"
//!    (condition "A.NetClass == 'HV' || B.NetClass == 'HV'")
//!    (constraint clearance (min 1.5mm)))
//! ```

pub mod condition;
pub mod engine;
pub mod error;
pub mod implicit;
pub mod items_provider;
pub mod marker;
pub mod parallel;
pub mod progress;
pub mod provider;
pub mod report;
pub mod rule;
pub mod rule_parser;
pub mod rule_set;
pub mod settings;
pub mod units;
pub mod violation;

pub use condition::{ConditionError, EvalContext, EvalError, RuleCondition};
pub use engine::{DrcEngine, MarkerHandler};
pub use error::DrcError;
pub use items_provider::{
    BoardMarkersProvider, RatsnestItemsProvider, RcItemsProvider, SeverityMask, VectorItemsProvider,
};
pub use marker::{Marker, MarkerList};
pub use parallel::WorkerPool;
pub use progress::{CancellationToken, LogProgressReporter, ProgressReporter};
pub use provider::{ProviderRegistry, TestProvider};
pub use report::{DrcReport, RunStatus};
pub use rule::{Constraint, ConstraintType, ConstraintValue, LayerCondition, MinOptMax, Rule, Specificity};
pub use rule_parser::{RuleParser, RULES_VERSION};
pub use settings::{BoardMinimums, DrcSettings};
pub use violation::{DrcItem, ErrorCode, Severity, ERROR_CODES_VERSION};
