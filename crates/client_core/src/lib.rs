pub mod gateway;
pub mod outcome;
pub mod session;
pub mod state;
pub mod timer;

pub use gateway::{
    normalize_base_url, BaseUrlError, GatewayError, HttpInventoryGateway, InventoryGateway,
};
pub use outcome::{failure_message, OperationOutcome};
pub use session::{
    ScanDispatch, ScanSession, SessionConfig, ADD_MODE_TIMEOUT, CONFIGURATION_REQUIRED_MESSAGE,
    COUNTDOWN_TICK,
};
pub use state::{Countdown, ObservableState, SessionEvent};
pub use timer::SessionTimer;
