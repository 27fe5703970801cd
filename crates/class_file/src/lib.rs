// https://docs.oracle.com/javase/specs/jvms/se19/html/jvms-4.html

#[macro_use]
mod constant_pool;

pub mod access_flags;
pub mod attributes;
mod class_file;
pub mod descriptor;
mod error;
mod parser;
mod validator;

pub use self::class_file::{ClassFile, MemberInfo, MemberKind, MAGIC_IDENTIFIER};
pub use access_flags::{AccessFlags, FlagTarget};
pub use constant_pool::{
    ClassInfo, ConstantPool, ConstantTag, CpInfo, DynamicInfo, MethodHandleInfo,
    MethodTypeInfo, NameAndTypeInfo, RefInfo, ReferenceKind,
};
pub use error::{ClassFileError, ErrorKind};
pub use parser::{Parser, MAX_NESTING};
pub use validator::{Validator, INTERFACE_METHOD_HANDLE_VERSION};

pub type Result<T, E = ClassFileError> = std::result::Result<T, E>;

/// Decodes `bytes` as one complete class file.
pub fn decode(bytes: &[u8]) -> Result<ClassFile> {
    ClassFile::parse(bytes)
}

/// Validates `class_file`, applying the version-gated rules of `major_version`.
pub fn validate(class_file: &ClassFile, major_version: u16) -> Result<()> {
    Validator::new(&class_file.constant_pool, major_version).validate_class_file(class_file)
}
