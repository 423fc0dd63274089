pub mod credentials;
pub mod error;
pub mod gateway;

pub use credentials::{Credential, CredentialCache};
pub use error::{AuthError, TransportError};
pub use gateway::{HttpGateway, HttpResponse, RetryPolicy, with_retry};
