//! Command implementations.

pub mod clear;
pub mod commit;
pub mod duplicates;
pub mod history;
pub mod list;
pub mod prompt;
pub mod reconcile;
pub mod stage;

pub use self::clear::{execute_clear, execute_clear_case};
pub use self::commit::execute_commit;
pub use self::duplicates::execute_duplicates;
pub use self::history::execute_history;
pub use self::list::execute_list;
pub use self::prompt::execute_prompt;
pub use self::reconcile::execute_reconcile;
pub use self::stage::execute_stage;
