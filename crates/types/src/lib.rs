pub mod events;
mod page;
mod source;

pub use events::{ControlEvent, LifecycleEvent, PlayAudioEvent, PlayAudioRequestEvent};
pub use page::PageText;
pub use source::{AudioSource, PlaybackRequest, SynthesisInput};
