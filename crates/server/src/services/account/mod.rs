pub mod account_service;
pub mod document_store;
pub mod locks;


pub use account_service::{AccountService, AccountServiceTrait, DynAccountService};
pub use document_store::DocumentStore;
pub use locks::{AccountLockGuard, AccountLocks};
