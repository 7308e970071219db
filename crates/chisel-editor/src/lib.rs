pub mod command;
pub mod commands;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod event;
pub mod handlers;
pub mod input;
pub mod selection;
pub mod shortcuts;
pub mod snap;
pub mod step;
pub mod transaction;
pub mod view;

pub use command::{CommandContext, CommandOutcome, CommandRegistry, MultistepCommand, run_command};
pub use config::{EditorConfig, SnapConfig};
pub use controller::{AsyncController, ControllerState, Outcome};
pub use document::{Document, DocumentId};
pub use error::{CancelReason, EditorError};
pub use event::{CursorType, EventBus, SubscriptionId, Topic};
pub use input::InputEvent;
pub use selection::{NodeFilter, PickFilters, Selection, ShapeFilter};
pub use snap::{SnapData, SnapKind, SnapResult};
pub use step::{PointStep, SelectNodeStep, SelectShapeStep, Step, StepData};
pub use transaction::{History, HistoryRecord, Transaction};
pub use view::{EventHandler, HandlerToken, View};
