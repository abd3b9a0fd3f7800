pub mod form;
pub mod level;
pub mod session;
pub mod ui;
pub mod validate;
pub mod view;

pub use form::{FieldRef, FormError, FormId, FormKey, FormMode, NodeForm};
pub use level::{ChildInfo, NodeStyle, child_info_for, style_for};
pub use session::{SessionEvent, TreeSession, TreeSource};
pub use validate::{TreeError, validate_forest, validate_tree};
pub use view::{NodeFlags, Row, RowTarget, TreeCallbacks, TreeView};
