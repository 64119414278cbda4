//! Human selection through an out-of-process picker.

pub mod process;
pub mod schema;

pub use process::{Picker, ProcessPicker, Selection};
pub use schema::{Choice, ChoiceSet, PickerMode, PickerRequest, PickerResponse, SCHEMA_VERSION};
