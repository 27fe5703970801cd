use std::{convert::TryFrom, fmt};

use crate::{ClassFileError, Result};

#[macro_export]
macro_rules! matches_cp_info {
    ($cp:expr, $index:expr, $i:ident, $context:expr) => {
        match $cp.entry($index, $context)? {
            $crate::constant_pool::CpInfo::$i(ref n) => Ok(n),
            c => Err($crate::ClassFileError::UnexpectedConstantPoolEntry {
                context: $context,
                index: $index,
                expected: $crate::constant_pool::ConstantTag::$i.to_string(),
                found: c
                    .tag()
                    .unwrap_or($crate::constant_pool::ConstantTag::Utf8),
            }),
        }
    };
}

/// The one-indexed constant pool.
///
/// Slot 0 is never stored. The slot following a `Long` or `Double` is kept as
/// [`CpInfo::Unusable`] so that indices line up with the class file.
#[derive(Debug, Default)]
pub struct ConstantPool {
    cp_infos: Vec<CpInfo>,
}
impl ConstantPool {
    pub fn new(cp_infos: Vec<CpInfo>) -> Self {
        Self { cp_infos }
    }

    /// The `constant_pool_count` this pool was decoded from.
    pub fn count(&self) -> usize {
        self.cp_infos.len() + 1
    }

    /// Returns the entry at `index`, or `None` for index 0 and indices past the end.
    pub fn get(&self, index: u16) -> Option<&CpInfo> {
        (index as usize)
            .checked_sub(1)
            .and_then(|i| self.cp_infos.get(i))
    }

    /// Resolves `index` to a usable entry, failing for absent and unusable slots.
    pub fn entry(&self, index: u16, context: &'static str) -> Result<&CpInfo> {
        match self.get(index) {
            None => Err(ClassFileError::InvalidConstantPoolIndex { context, index }),
            Some(CpInfo::Unusable) => {
                Err(ClassFileError::UnusableConstantPoolEntry { context, index })
            }
            Some(cp_info) => Ok(cp_info),
        }
    }

    /// Resolves `index` and checks that the entry carries one of `expected`.
    pub fn expect(
        &self,
        index: u16,
        expected: &[ConstantTag],
        context: &'static str,
    ) -> Result<&CpInfo> {
        let cp_info = self.entry(index, context)?;
        // `entry` never hands out unusable slots, so the tag is always present.
        let found = cp_info.tag().unwrap_or(ConstantTag::Utf8);
        if expected.contains(&found) {
            Ok(cp_info)
        } else {
            Err(ClassFileError::UnexpectedConstantPoolEntry {
                context,
                index,
                expected: expected
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or "),
                found,
            })
        }
    }

    /// Like [`ConstantPool::expect`], but index 0 is accepted as "absent".
    pub fn expect_optional(
        &self,
        index: u16,
        expected: &[ConstantTag],
        context: &'static str,
    ) -> Result<Option<&CpInfo>> {
        if index == 0 {
            return Ok(None);
        }
        self.expect(index, expected, context).map(Some)
    }

    pub fn utf8(&self, index: u16, context: &'static str) -> Result<&str> {
        let s: &String = matches_cp_info!(self, index, Utf8, context)?;
        Ok(s.as_str())
    }

    /// Resolves a `Class` entry to its internal binary name.
    pub fn class_name(&self, index: u16, context: &'static str) -> Result<&str> {
        let ClassInfo { name_index } = matches_cp_info!(self, index, Class, context)?;
        self.utf8(*name_index, context)
    }
}
impl<'a> IntoIterator for &'a ConstantPool {
    type Item = &'a CpInfo;
    type IntoIter = std::slice::Iter<'a, CpInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.cp_infos.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
}

impl ConstantTag {
    /// Long and Double entries take up two slots of the pool.
    pub fn is_wide(self) -> bool {
        matches!(self, ConstantTag::Long | ConstantTag::Double)
    }
}

impl TryFrom<u8> for ConstantTag {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(ConstantTag::Utf8),
            3 => Ok(ConstantTag::Integer),
            4 => Ok(ConstantTag::Float),
            5 => Ok(ConstantTag::Long),
            6 => Ok(ConstantTag::Double),
            7 => Ok(ConstantTag::Class),
            8 => Ok(ConstantTag::String),
            9 => Ok(ConstantTag::FieldRef),
            10 => Ok(ConstantTag::MethodRef),
            11 => Ok(ConstantTag::InterfaceMethodRef),
            12 => Ok(ConstantTag::NameAndType),
            15 => Ok(ConstantTag::MethodHandle),
            16 => Ok(ConstantTag::MethodType),
            17 => Ok(ConstantTag::Dynamic),
            18 => Ok(ConstantTag::InvokeDynamic),
            19 => Ok(ConstantTag::Module),
            20 => Ok(ConstantTag::Package),
            _ => Err(value),
        }
    }
}

impl fmt::Display for ConstantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstantTag::Utf8 => "CONSTANT_Utf8",
            ConstantTag::Integer => "CONSTANT_Integer",
            ConstantTag::Float => "CONSTANT_Float",
            ConstantTag::Long => "CONSTANT_Long",
            ConstantTag::Double => "CONSTANT_Double",
            ConstantTag::Class => "CONSTANT_Class",
            ConstantTag::String => "CONSTANT_String",
            ConstantTag::FieldRef => "CONSTANT_Fieldref",
            ConstantTag::MethodRef => "CONSTANT_Methodref",
            ConstantTag::InterfaceMethodRef => "CONSTANT_InterfaceMethodref",
            ConstantTag::NameAndType => "CONSTANT_NameAndType",
            ConstantTag::MethodHandle => "CONSTANT_MethodHandle",
            ConstantTag::MethodType => "CONSTANT_MethodType",
            ConstantTag::Dynamic => "CONSTANT_Dynamic",
            ConstantTag::InvokeDynamic => "CONSTANT_InvokeDynamic",
            ConstantTag::Module => "CONSTANT_Module",
            ConstantTag::Package => "CONSTANT_Package",
        };
        f.write_str(name)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum CpInfo {
    Utf8(String),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(ClassInfo),
    String { string_index: u16 },
    FieldRef(RefInfo),
    MethodRef(RefInfo),
    InterfaceMethodRef(RefInfo),
    NameAndType(NameAndTypeInfo),
    MethodHandle(MethodHandleInfo),
    MethodType(MethodTypeInfo),
    Dynamic(DynamicInfo),
    InvokeDynamic(DynamicInfo),
    Module(ClassInfo),
    Package(ClassInfo),
    Unusable,
}

impl CpInfo {
    /// The tag this entry was decoded from; `None` for the unusable slot.
    pub fn tag(&self) -> Option<ConstantTag> {
        let tag = match self {
            CpInfo::Utf8(_) => ConstantTag::Utf8,
            CpInfo::Integer(_) => ConstantTag::Integer,
            CpInfo::Float(_) => ConstantTag::Float,
            CpInfo::Long(_) => ConstantTag::Long,
            CpInfo::Double(_) => ConstantTag::Double,
            CpInfo::Class(_) => ConstantTag::Class,
            CpInfo::String { .. } => ConstantTag::String,
            CpInfo::FieldRef(_) => ConstantTag::FieldRef,
            CpInfo::MethodRef(_) => ConstantTag::MethodRef,
            CpInfo::InterfaceMethodRef(_) => ConstantTag::InterfaceMethodRef,
            CpInfo::NameAndType(_) => ConstantTag::NameAndType,
            CpInfo::MethodHandle(_) => ConstantTag::MethodHandle,
            CpInfo::MethodType(_) => ConstantTag::MethodType,
            CpInfo::Dynamic(_) => ConstantTag::Dynamic,
            CpInfo::InvokeDynamic(_) => ConstantTag::InvokeDynamic,
            CpInfo::Module(_) => ConstantTag::Module,
            CpInfo::Package(_) => ConstantTag::Package,
            CpInfo::Unusable => return None,
        };
        Some(tag)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RefInfo {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

/// Shared by `Class`, `Module` and `Package` entries.
#[derive(Debug, PartialEq, Clone)]
pub struct ClassInfo {
    pub name_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct NameAndTypeInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
}

/// Shared by `Dynamic` and `InvokeDynamic` entries. The bootstrap index points
/// into the `BootstrapMethods` attribute, not into the pool.
#[derive(Debug, PartialEq, Clone)]
pub struct DynamicInfo {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodHandleInfo {
    pub reference_kind: u8,
    pub reference_index: u16,
}
impl MethodHandleInfo {
    pub fn kind(&self) -> Option<ReferenceKind> {
        ReferenceKind::try_from(self.reference_kind).ok()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodTypeInfo {
    pub descriptor_index: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl ReferenceKind {
    pub fn is_invoke(self) -> bool {
        !matches!(
            self,
            ReferenceKind::GetField
                | ReferenceKind::GetStatic
                | ReferenceKind::PutField
                | ReferenceKind::PutStatic
        )
    }
}

impl TryFrom<u8> for ReferenceKind {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(ReferenceKind::GetField),
            2 => Ok(ReferenceKind::GetStatic),
            3 => Ok(ReferenceKind::PutField),
            4 => Ok(ReferenceKind::PutStatic),
            5 => Ok(ReferenceKind::InvokeVirtual),
            6 => Ok(ReferenceKind::InvokeStatic),
            7 => Ok(ReferenceKind::InvokeSpecial),
            8 => Ok(ReferenceKind::NewInvokeSpecial),
            9 => Ok(ReferenceKind::InvokeInterface),
            _ => Err(value),
        }
    }
}

#[cfg(test)]
mod constant_pool_tests {
    use super::*;

    fn pool() -> ConstantPool {
        ConstantPool::new(vec![
            CpInfo::Utf8("java/lang/Object".into()),
            CpInfo::Class(ClassInfo { name_index: 1 }),
            CpInfo::Long(42),
            CpInfo::Unusable,
        ])
    }

    #[test]
    fn it_should_treat_index_zero_as_absent() {
        assert!(pool().get(0).is_none());
        assert!(pool().entry(0, "test").is_err());
    }

    #[test]
    fn it_should_resolve_a_class_name() {
        assert_eq!(
            pool().class_name(2, "test").unwrap(),
            "java/lang/Object"
        );
    }

    #[test]
    fn it_should_refuse_the_slot_after_a_long() {
        let err = pool().entry(4, "test").unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::UnusableConstantPoolEntry { index: 4, .. }
        ));
    }

    #[test]
    fn it_should_report_the_found_tag() {
        let err = pool()
            .expect(3, &[ConstantTag::Class], "test")
            .unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::UnexpectedConstantPoolEntry {
                found: ConstantTag::Long,
                ..
            }
        ));
    }

    #[test]
    fn it_should_accept_zero_for_optional_references() {
        assert!(pool()
            .expect_optional(0, &[ConstantTag::Class], "test")
            .unwrap()
            .is_none());
    }
}
