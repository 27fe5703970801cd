use crate::{
    access_flags::{self, FlagTarget},
    attributes::Attributes,
    descriptor,
    parser::Parser,
    validator::Validator,
    AccessFlags, ConstantPool, Result,
};

/// The fixed signature every class file starts with.
pub const MAGIC_IDENTIFIER: u32 = 0xCAFEBABE;

#[derive(Debug)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: AccessFlags,
    pub this_class: u16,
    /// Zero only for `java/lang/Object`.
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Attributes,
}
impl ClassFile {
    /// Decodes a complete class file. The input must contain nothing after
    /// the last top-level attribute.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile> {
        Parser::new(bytes).parse()
    }

    /// Validates every constant pool reference of this class file, using its
    /// own major version for version-gated rules.
    pub fn validate(&self) -> Result<()> {
        Validator::new(&self.constant_pool, self.major_version).validate_class_file(self)
    }

    pub fn super_class(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }

        Ok(Some(
            self.constant_pool
                .class_name(self.super_class, "super class")?,
        ))
    }

    pub fn class_name(&self) -> Result<&str> {
        self.constant_pool.class_name(self.this_class, "this class")
    }

    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|&index| self.constant_pool.class_name(index, "interface"))
            .collect()
    }

    pub fn member_name(&self, member: &MemberInfo) -> Result<&str> {
        member.name(&self.constant_pool)
    }

    pub fn member_descriptor(&self, member: &MemberInfo) -> Result<&str> {
        member.descriptor(&self.constant_pool)
    }

    /// Renders the class header, e.g. `public super my.MyClass extends my.Base implements java.io.Serializable`.
    pub fn describe(&self) -> Result<String> {
        let mut s = access_flags::modifiers(self.access_flags, FlagTarget::Class);
        if !s.is_empty() {
            s.push(' ');
        }
        s.push_str(&self.class_name()?.replace('/', "."));

        if let Some(super_class) = self.super_class()? {
            if super_class != "java/lang/Object" {
                s.push_str(" extends ");
                s.push_str(&super_class.replace('/', "."));
            }
        }

        let interfaces = self.interface_names()?;
        if !interfaces.is_empty() {
            s.push_str(" implements ");
            s.push_str(
                &interfaces
                    .iter()
                    .map(|name| name.replace('/', "."))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
        }

        Ok(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}
impl From<MemberKind> for FlagTarget {
    fn from(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Field => FlagTarget::Field,
            MemberKind::Method => FlagTarget::Method,
        }
    }
}

/// A field or a method. Both share the same layout and rules; `kind` only
/// selects how the access flags are rendered.
#[derive(Debug)]
pub struct MemberInfo {
    pub kind: MemberKind,
    pub access_flags: AccessFlags,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Attributes,
}
impl MemberInfo {
    pub fn name<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.name_index, "member name")
    }

    pub fn descriptor<'a>(&self, constant_pool: &'a ConstantPool) -> Result<&'a str> {
        constant_pool.utf8(self.descriptor_index, "member descriptor")
    }

    /// Renders the member as a declaration, e.g. `private final int myField`.
    pub fn describe(&self, constant_pool: &ConstantPool) -> Result<String> {
        let flags = access_flags::modifiers(self.access_flags, self.kind.into());
        let signature =
            descriptor::signature(self.name(constant_pool)?, self.descriptor(constant_pool)?)?;

        if flags.is_empty() {
            Ok(signature)
        } else {
            Ok(format!("{} {}", flags, signature))
        }
    }
}
