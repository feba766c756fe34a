//! Structured legal sources used directly by the retriever.

pub mod courtlistener;
pub mod federal_register;

pub use courtlistener::CourtListenerClient;
pub use federal_register::FederalRegisterClient;
