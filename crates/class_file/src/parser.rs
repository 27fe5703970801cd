mod attributes;

use std::{
    convert::TryFrom,
    io::{self, Cursor, Read},
};

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, trace};

use crate::{
    class_file::{MemberInfo, MemberKind, MAGIC_IDENTIFIER},
    constant_pool::{
        ClassInfo, ConstantTag, CpInfo, DynamicInfo, MethodHandleInfo, MethodTypeInfo,
        NameAndTypeInfo, RefInfo,
    },
    AccessFlags, ClassFile, ClassFileError, ConstantPool, Result,
};

type Endian = BigEndian;

/// How deep element values, annotations and attribute lists may nest.
pub const MAX_NESTING: u16 = 256;

/// Decodes a class file from an in-memory buffer in a single forward pass.
pub struct Parser<'a> {
    r: Cursor<&'a [u8]>,
    depth: u16,
}
impl<'a> Parser<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            r: Cursor::new(buf),
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<ClassFile> {
        self.parse_magic_identifier()?;
        let (major_version, minor_version) = self.parse_version()?;
        debug!("class file version {}.{}", major_version, minor_version);

        let constant_pool = self.parse_constant_pool()?;
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let this_class = self.read_u16()?;
        let super_class = self.read_u16()?;
        let interfaces_count = self.read_u16()?;
        let interfaces = self.read_u16_list(interfaces_count)?;

        let fields_count = self.read_u16()?;
        let fields = (0..fields_count)
            .map(|_| self.parse_member_info(MemberKind::Field, &constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let methods_count = self.read_u16()?;
        let methods = (0..methods_count)
            .map(|_| self.parse_member_info(MemberKind::Method, &constant_pool))
            .collect::<Result<Vec<_>>>()?;

        let attributes_count = self.read_u16()?;
        let attributes = self.parse_attributes(attributes_count, &constant_pool)?;
        debug!(
            "decoded {} interfaces, {} fields, {} methods, {} attributes",
            interfaces.len(),
            fields.len(),
            methods.len(),
            attributes.len()
        );

        match self.remaining() {
            0 => {}
            extra => return Err(ClassFileError::TrailingData(extra)),
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    fn parse_member_info(
        &mut self,
        kind: MemberKind,
        constant_pool: &ConstantPool,
    ) -> Result<MemberInfo> {
        let access_flags = AccessFlags::from_bits_truncate(self.read_u16()?);
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes_count = self.read_u16()?;
        let attributes = self.parse_attributes(attributes_count, constant_pool)?;

        Ok(MemberInfo {
            kind,
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn parse_magic_identifier(&mut self) -> Result<()> {
        match self.read_u32()? {
            MAGIC_IDENTIFIER => Ok(()),
            magic_identifier => Err(ClassFileError::InvalidMagicIdentifier(magic_identifier)),
        }
    }

    fn parse_version(&mut self) -> Result<(u16, u16)> {
        let minor = self.read_u16()?;
        let major = self.read_u16()?;
        Ok((major, minor))
    }

    fn parse_constant_pool(&mut self) -> Result<ConstantPool> {
        let constant_pool_count = self.read_u16()? as usize;
        debug!("constant pool count {}", constant_pool_count);

        let mut res = Vec::with_capacity(constant_pool_count.saturating_sub(1));
        let mut index = 1;
        while index < constant_pool_count {
            let cp_info = self.parse_cp_info()?;
            trace!("#{} = {:?}", index, cp_info);
            let wide = cp_info.tag().map_or(false, ConstantTag::is_wide);
            res.push(cp_info);
            index += 1;

            if wide {
                // The slot after a long or double exists but is never usable.
                if index < constant_pool_count {
                    res.push(CpInfo::Unusable);
                }
                index += 1;
            }
        }
        Ok(ConstantPool::new(res))
    }

    fn parse_cp_info(&mut self) -> Result<CpInfo> {
        let tag = self.read_u8()?;
        let tag = ConstantTag::try_from(tag).map_err(ClassFileError::InvalidCpInfoTag)?;

        Ok(match tag {
            ConstantTag::Utf8 => CpInfo::Utf8(self.read_modified_utf8()?),
            ConstantTag::Integer => CpInfo::Integer(self.read_i32()?),
            ConstantTag::Float => CpInfo::Float(f32::from_bits(self.read_u32()?)),
            ConstantTag::Long => CpInfo::Long(self.read_i64()?),
            ConstantTag::Double => CpInfo::Double(f64::from_bits(self.read_u64()?)),
            ConstantTag::Class => CpInfo::Class(self.parse_class_info()?),
            ConstantTag::String => CpInfo::String {
                string_index: self.read_u16()?,
            },
            ConstantTag::FieldRef => CpInfo::FieldRef(self.parse_ref_info()?),
            ConstantTag::MethodRef => CpInfo::MethodRef(self.parse_ref_info()?),
            ConstantTag::InterfaceMethodRef => CpInfo::InterfaceMethodRef(self.parse_ref_info()?),
            ConstantTag::NameAndType => CpInfo::NameAndType(self.parse_name_and_type_info()?),
            ConstantTag::MethodHandle => CpInfo::MethodHandle(self.parse_method_handle()?),
            ConstantTag::MethodType => CpInfo::MethodType(MethodTypeInfo {
                descriptor_index: self.read_u16()?,
            }),
            ConstantTag::Dynamic => CpInfo::Dynamic(self.parse_dynamic_info()?),
            ConstantTag::InvokeDynamic => CpInfo::InvokeDynamic(self.parse_dynamic_info()?),
            ConstantTag::Module => CpInfo::Module(self.parse_class_info()?),
            ConstantTag::Package => CpInfo::Package(self.parse_class_info()?),
        })
    }

    fn parse_class_info(&mut self) -> Result<ClassInfo> {
        let name_index = self.read_u16()?;

        Ok(ClassInfo { name_index })
    }

    fn parse_ref_info(&mut self) -> Result<RefInfo> {
        let class_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(RefInfo {
            class_index,
            name_and_type_index,
        })
    }

    fn parse_name_and_type_info(&mut self) -> Result<NameAndTypeInfo> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;

        Ok(NameAndTypeInfo {
            name_index,
            descriptor_index,
        })
    }

    fn parse_method_handle(&mut self) -> Result<MethodHandleInfo> {
        let reference_kind = self.read_u8()?;
        let reference_index = self.read_u16()?;

        Ok(MethodHandleInfo {
            reference_kind,
            reference_index,
        })
    }

    fn parse_dynamic_info(&mut self) -> Result<DynamicInfo> {
        let bootstrap_method_attr_index = self.read_u16()?;
        let name_and_type_index = self.read_u16()?;

        Ok(DynamicInfo {
            bootstrap_method_attr_index,
            name_and_type_index,
        })
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(ClassFileError::NestingTooDeep(MAX_NESTING));
        }

        self.depth += 1;
        let res = f(self);
        self.depth -= 1;
        res
    }

    fn position(&self) -> u64 {
        self.r.position()
    }

    fn remaining(&self) -> usize {
        self.r
            .get_ref()
            .len()
            .saturating_sub(self.r.position() as usize)
    }

    /// Reads a `u16` length followed by that many bytes of modified UTF-8.
    fn read_modified_utf8(&mut self) -> Result<String> {
        let length = self.read_u16()?;
        let bytes = self.read_bytes(length as usize)?;

        cesu8::from_java_cesu8(&bytes)
            .map(|s| s.into_owned())
            .map_err(|_| ClassFileError::InvalidModifiedUtf8)
    }

    fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>> {
        // Refuse before allocating: declared lengths come straight from the input.
        if length > self.remaining() {
            return Err(ClassFileError::Truncated(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "needed {} bytes, {} remaining",
                    length,
                    self.remaining()
                ),
            )));
        }

        let mut bytes = vec![0u8; length];
        self.r.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_u16_list(&mut self, count: u16) -> Result<Vec<u16>> {
        let mut list = vec![0u16; count as usize];
        self.r.read_u16_into::<Endian>(&mut list)?;
        Ok(list)
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(self.r.read_u64::<Endian>()?)
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(self.r.read_u32::<Endian>()?)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(self.r.read_u16::<Endian>()?)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.r.read_u8()?)
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(self.r.read_i64::<Endian>()?)
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(self.r.read_i32::<Endian>()?)
    }
}
