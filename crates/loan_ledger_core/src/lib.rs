pub mod domain;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod ports;
pub mod service;
pub mod validation;

pub use domain::{
    Loan, LoanDetails, LoanId, NewLoan, NewPayment, NewUser, Payment, PaymentId, RecordedPayment,
    Requester, SessionToken, User, UserCredentials, UserId, UserProfile,
};
pub use error::{LedgerError, LedgerResult};
pub use ledger::LoanState;
pub use memory::MemoryStore;
pub use ports::{
    Clock, CredentialService, LoanRepository, PaymentRepository, PortError, PortResult,
    SystemClock, UserRepository,
};
pub use service::{LedgerService, LedgerSettings, NewLedgerService, Session};
pub use validation::{FieldError, LoanRequest, PaymentRequest, Registration, ValidationErrors};
