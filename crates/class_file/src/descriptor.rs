use crate::{ClassFileError, Result};

/// Renders a field or method descriptor as a source-like declaration.
///
/// `("count", "I")` becomes `int count`, `("add", "(I[Ljava/lang/String;)F")`
/// becomes `float add(int, java.lang.String[])`.
pub fn signature(name: &str, descriptor: &str) -> Result<String> {
    let Some(rest) = descriptor.strip_prefix('(') else {
        return Ok(format!("{} {}", expand(descriptor)?.join(", "), name));
    };

    let (parameters, return_type) = rest
        .split_once(')')
        .ok_or_else(|| ClassFileError::InvalidDescriptor(descriptor.to_owned()))?;

    Ok(format!(
        "{} {}({})",
        expand(return_type)?.join(", "),
        name,
        expand(parameters)?.join(", ")
    ))
}

/// Expands a run of field types into their source spelling.
fn expand(descriptor: &str) -> Result<Vec<String>> {
    let invalid = || ClassFileError::InvalidDescriptor(descriptor.to_owned());

    let mut types = Vec::new();
    let mut dimensions = 0;
    let mut chars = descriptor.char_indices();
    while let Some((i, c)) = chars.next() {
        let base = match c {
            '[' => {
                dimensions += 1;
                continue;
            }
            'L' => {
                let end = descriptor[i..].find(';').ok_or_else(invalid)? + i;
                // Skip the class name; the iterator resumes after the ';'.
                for _ in descriptor[i + 1..=end].chars() {
                    chars.next();
                }
                descriptor[i + 1..end].replace('/', ".")
            }
            'B' => "byte".to_owned(),
            'C' => "char".to_owned(),
            'D' => "double".to_owned(),
            'F' => "float".to_owned(),
            'I' => "int".to_owned(),
            'J' => "long".to_owned(),
            'S' => "short".to_owned(),
            'Z' => "boolean".to_owned(),
            'V' => "void".to_owned(),
            _ => return Err(invalid()),
        };

        types.push(format!("{}{}", base, "[]".repeat(dimensions)));
        dimensions = 0;
    }

    if dimensions != 0 {
        return Err(invalid());
    }

    Ok(types)
}
