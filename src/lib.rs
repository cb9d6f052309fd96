pub mod catalog;
pub mod cli;
pub mod engine;
pub mod index;
pub mod lookup;
pub mod order;
pub mod profile;
pub mod sorter;
pub mod tracker;

pub use catalog::{ConflictRule, ModCategory, ModDependency, ModEntry};
pub use engine::{EngineError, LoadOrderEngine, MissingDependency, ResolveReport};
pub use lookup::{LookupEntry, MetadataLookup, NullLookup, TableLookup};
pub use sorter::{SortOutcome, SortPriority};
