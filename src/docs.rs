//! Generated method documentation

use crate::introspection::{NormalizedOperation, NormalizedParam};
/// Docstring used when an operation has nothing better to say
pub const DEFAULT_DOCSTRING: &str =
    "Calls the matching operation on the underlying connection.\n:returns: The response data received\n:rtype: dict\n";

/// Render the docstring for a generated method
pub fn build_docstring(description: &str, params: &[NormalizedParam]) -> String {
    let mut doc = String::new();
    let description = description.trim();

    if !description.is_empty() {
        doc.push_str(description);
        doc.push('\n');
    }

    for param in params {
        doc.push_str(&format!(":param {}: {}\n", param.var_name, param.docs));
        doc.push_str(&format!(":type {}: {}\n", param.var_name, param.param_type));
    }

    doc.push_str(":returns: The response data received\n");
    doc.push_str(":rtype: dict\n");
    doc
}

pub fn docstring_for(operation: &NormalizedOperation) -> String {
    build_docstring(&operation.docs, &operation.params)
}
