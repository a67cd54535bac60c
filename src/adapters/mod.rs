//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                    |
//! |----------------|--------------------|--------------------------------|
//! | `config_file`  | ConfigPort         | JSON file on disk              |
//! | `hardware`     | AcquisitionPort    | ADC / thermal simulator        |
//! |                | ActuatorPort       | relay lines / simulated relays |
//! | `journal`      | PersistencePort    | COBS/postcard step journal     |
//! | `log_sink`     | EventSink          | Log output                     |
//! | `time`         | Clock              | System or virtual time         |

pub mod config_file;
pub mod hardware;
pub mod journal;
pub mod log_sink;
pub mod time;
