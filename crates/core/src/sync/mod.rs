//! Provider registry, sync orchestration and scheduling.

mod orchestrator;
mod registry;
mod scheduler;
mod symbol_issues;

pub use orchestrator::{SyncOrchestrator, SyncPaths};
pub use registry::ProviderRegistry;
pub use scheduler::SyncScheduler;
pub use symbol_issues::SymbolIssues;

#[cfg(test)]
mod orchestrator_tests;
