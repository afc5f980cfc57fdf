//! Question tree: model, literal validation rules, traversal, serializer.

pub mod model;
pub mod serialize;
pub mod traversal;
pub mod validation;

pub use model::{
    Dynamic, FunctionQuestion, GroupNode, MultiSelectQuestion, OptionItem, QTreeNode, Question,
    SelectionChange, SingleSelectQuestion, StaticOption, TextQuestion, Validation,
};
pub use serialize::{detach_tree, serialize_tree};
pub use traversal::{filter, flatten};
pub use validation::ValidationRule;
