pub mod catalog;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod padron;
pub mod soap;
pub mod testing;
pub mod wsaa;

pub use catalog::{Environment, LookupMode, ServiceDescriptor, ServiceKind};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, CredentialsConfig,
    SanitizedConfig, TicketConfig,
};
pub use metrics::{encode_metrics, Metrics};
pub use orchestrator::{
    Completion, ItemError, LookupConfig, LookupEntry, LookupError, LookupOptions,
    LookupOrchestrator, LookupOutcome, LookupResult, TicketCache, TicketSource,
};
pub use padron::{
    Address, PadronTransport, PersonaRecord, RequestCredentials, ServerStatus,
    SoapPadronTransport,
};
pub use soap::{SoapClient, SoapError, XmlElement};
pub use wsaa::{
    AuthError, AuthorizationTicket, LoginResponse, LoginTransport, MessageSigner, SignedRequest,
    SigningCredentials, SoapLoginTransport, TicketProvider, TicketRequest, WsaaAuthenticator,
};
