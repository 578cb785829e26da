pub mod ledger;
pub mod llm;
pub mod permissions;
pub mod submissions;
