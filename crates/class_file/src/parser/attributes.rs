use log::{debug, trace};

use crate::{
    attributes::{
        Annotation, Attribute, AttributeInfo, Attributes, BootstrapMethod, CodeAttribute,
        ElementValue, ElementValuePair, ExceptionTableEntry, Exports, InnerClass, LineNumber,
        LocalVarTarget, LocalVariable, MethodParameter, Module, Opens, Provides, RawBytes,
        RecordComponent, Requires, StackMapFrame, TargetInfo, TypeAnnotation, TypePathEntry,
        VerificationType,
    },
    constant_pool::CpInfo,
    ClassFileError, ConstantPool, Result,
};

use super::Parser;

/// Code arrays must be non-empty and shorter than 65536 bytes.
const MAX_CODE_LENGTH: u32 = 65535;

impl<'a> Parser<'a> {
    pub(crate) fn parse_attributes(
        &mut self,
        attributes_count: u16,
        constant_pool: &ConstantPool,
    ) -> Result<Attributes> {
        (0..attributes_count)
            .map(|_| self.parse_attribute(constant_pool))
            .collect::<Result<Vec<_>>>()
            .map(Attributes)
    }

    fn parse_attribute(&mut self, constant_pool: &ConstantPool) -> Result<Attribute> {
        let attribute_name_index = self.read_u16()?;
        let attribute_length = self.read_u32()?;

        let name = match constant_pool.get(attribute_name_index) {
            Some(CpInfo::Utf8(name)) => Some(name.as_str()),
            _ => None,
        };

        let start = self.position();
        let info = match name {
            Some(name) => {
                trace!("attribute {} ({} bytes)", name, attribute_length);
                self.parse_attribute_info(name, attribute_length, constant_pool)?
            }
            None => {
                debug!(
                    "attribute name index {} is not a Utf8 constant, keeping {} bytes",
                    attribute_name_index, attribute_length
                );
                AttributeInfo::Unknown(RawBytes(self.read_bytes(attribute_length as usize)?))
            }
        };

        let actual = self.position() - start;
        if actual != attribute_length as u64 {
            return Err(ClassFileError::AttributeLengthMismatch {
                name: name.unwrap_or("<unresolved>").to_owned(),
                declared: attribute_length,
                actual,
            });
        }

        Ok(Attribute {
            attribute_name_index,
            attribute_length,
            info,
        })
    }

    fn parse_attribute_info(
        &mut self,
        name: &str,
        attribute_length: u32,
        constant_pool: &ConstantPool,
    ) -> Result<AttributeInfo> {
        Ok(match name {
            "ConstantValue" => AttributeInfo::ConstantValue {
                constantvalue_index: self.read_u16()?,
            },
            "Code" => AttributeInfo::Code(self.parse_code_attribute(constant_pool)?),
            "StackMapTable" => {
                let number_of_entries = self.read_u16()?;
                AttributeInfo::StackMapTable(
                    (0..number_of_entries)
                        .map(|_| self.parse_stack_map_frame())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "Exceptions" => {
                let number_of_exceptions = self.read_u16()?;
                AttributeInfo::Exceptions(self.read_u16_list(number_of_exceptions)?)
            }
            "InnerClasses" => {
                let number_of_classes = self.read_u16()?;
                AttributeInfo::InnerClasses(
                    (0..number_of_classes)
                        .map(|_| self.parse_inner_class())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "EnclosingMethod" => AttributeInfo::EnclosingMethod {
                class_index: self.read_u16()?,
                method_index: self.read_u16()?,
            },
            "Synthetic" => {
                // Markers carry no payload; a non-zero length is rejected by validation.
                self.read_bytes(attribute_length as usize)?;
                AttributeInfo::Synthetic
            }
            "Deprecated" => {
                self.read_bytes(attribute_length as usize)?;
                AttributeInfo::Deprecated
            }
            "Signature" => AttributeInfo::Signature {
                signature_index: self.read_u16()?,
            },
            "SourceFile" => AttributeInfo::SourceFile {
                sourcefile_index: self.read_u16()?,
            },
            "SourceDebugExtension" => AttributeInfo::SourceDebugExtension(RawBytes(
                self.read_bytes(attribute_length as usize)?,
            )),
            "LineNumberTable" => {
                let line_number_table_length = self.read_u16()?;
                AttributeInfo::LineNumberTable(
                    (0..line_number_table_length)
                        .map(|_| self.parse_line_number())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "LocalVariableTable" => AttributeInfo::LocalVariableTable(self.parse_local_variables()?),
            "LocalVariableTypeTable" => {
                AttributeInfo::LocalVariableTypeTable(self.parse_local_variables()?)
            }
            "RuntimeVisibleAnnotations" => {
                AttributeInfo::RuntimeVisibleAnnotations(self.parse_annotations()?)
            }
            "RuntimeInvisibleAnnotations" => {
                AttributeInfo::RuntimeInvisibleAnnotations(self.parse_annotations()?)
            }
            "RuntimeVisibleParameterAnnotations" => {
                AttributeInfo::RuntimeVisibleParameterAnnotations(
                    self.parse_parameter_annotations()?,
                )
            }
            "RuntimeInvisibleParameterAnnotations" => {
                AttributeInfo::RuntimeInvisibleParameterAnnotations(
                    self.parse_parameter_annotations()?,
                )
            }
            "RuntimeVisibleTypeAnnotations" => {
                AttributeInfo::RuntimeVisibleTypeAnnotations(self.parse_type_annotations()?)
            }
            "RuntimeInvisibleTypeAnnotations" => {
                AttributeInfo::RuntimeInvisibleTypeAnnotations(self.parse_type_annotations()?)
            }
            "AnnotationDefault" => AttributeInfo::AnnotationDefault(self.parse_element_value()?),
            "BootstrapMethods" => {
                let num_bootstrap_methods = self.read_u16()?;
                AttributeInfo::BootstrapMethods(
                    (0..num_bootstrap_methods)
                        .map(|_| self.parse_bootstrap_method())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "MethodParameters" => {
                let parameters_count = self.read_u8()?;
                AttributeInfo::MethodParameters(
                    (0..parameters_count)
                        .map(|_| self.parse_method_parameter())
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "Module" => AttributeInfo::Module(self.parse_module()?),
            "ModulePackages" => {
                let package_count = self.read_u16()?;
                AttributeInfo::ModulePackages(self.read_u16_list(package_count)?)
            }
            "ModuleMainClass" => AttributeInfo::ModuleMainClass {
                main_class_index: self.read_u16()?,
            },
            "NestHost" => AttributeInfo::NestHost {
                host_class_index: self.read_u16()?,
            },
            "NestMembers" => {
                let number_of_classes = self.read_u16()?;
                AttributeInfo::NestMembers(self.read_u16_list(number_of_classes)?)
            }
            "PermittedSubclasses" => {
                let number_of_classes = self.read_u16()?;
                AttributeInfo::PermittedSubclasses(self.read_u16_list(number_of_classes)?)
            }
            "Record" => {
                let components_count = self.read_u16()?;
                AttributeInfo::Record(
                    (0..components_count)
                        .map(|_| self.parse_record_component(constant_pool))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            _ => {
                debug!("skipping unknown attribute {} ({} bytes)", name, attribute_length);
                AttributeInfo::Unknown(RawBytes(self.read_bytes(attribute_length as usize)?))
            }
        })
    }

    pub(crate) fn parse_code_attribute(
        &mut self,
        constant_pool: &ConstantPool,
    ) -> Result<CodeAttribute> {
        let max_stack = self.read_u16()?;
        let max_locals = self.read_u16()?;
        let code_length = self.read_u32()?;
        if code_length == 0 || code_length > MAX_CODE_LENGTH {
            return Err(ClassFileError::InvalidCodeLength(code_length));
        }
        let code = self.read_bytes(code_length as usize)?;
        let exception_table_length = self.read_u16()?;
        let exception_table = (0..exception_table_length)
            .map(|_| self.parse_exception_table_entry())
            .collect::<Result<Vec<_>>>()?;
        let attributes_count = self.read_u16()?;
        let attributes = self.nested(|p| p.parse_attributes(attributes_count, constant_pool))?;

        Ok(CodeAttribute {
            max_stack,
            max_locals,
            code: RawBytes(code),
            exception_table,
            attributes,
        })
    }

    fn parse_exception_table_entry(&mut self) -> Result<ExceptionTableEntry> {
        let start_pc = self.read_u16()?;
        let end_pc = self.read_u16()?;
        let handler_pc = self.read_u16()?;
        let catch_type = self.read_u16()?;

        Ok(ExceptionTableEntry {
            start_pc,
            end_pc,
            handler_pc,
            catch_type,
        })
    }

    fn parse_stack_map_frame(&mut self) -> Result<StackMapFrame> {
        let frame_type = self.read_u8()?;

        Ok(match frame_type {
            0..=63 => StackMapFrame::Same {
                offset_delta: frame_type as u16,
            },
            64..=127 => StackMapFrame::SameLocals1StackItem {
                offset_delta: (frame_type - 64) as u16,
                stack: self.parse_verification_type()?,
            },
            247 => StackMapFrame::SameLocals1StackItemExtended {
                offset_delta: self.read_u16()?,
                stack: self.parse_verification_type()?,
            },
            248..=250 => StackMapFrame::Chop {
                chopped: 251 - frame_type,
                offset_delta: self.read_u16()?,
            },
            251 => StackMapFrame::SameExtended {
                offset_delta: self.read_u16()?,
            },
            252..=254 => {
                let offset_delta = self.read_u16()?;
                let locals = (0..frame_type - 251)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<Vec<_>>>()?;
                StackMapFrame::Append {
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = self.read_u16()?;
                let number_of_locals = self.read_u16()?;
                let locals = (0..number_of_locals)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<Vec<_>>>()?;
                let number_of_stack_items = self.read_u16()?;
                let stack = (0..number_of_stack_items)
                    .map(|_| self.parse_verification_type())
                    .collect::<Result<Vec<_>>>()?;
                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
            _ => return Err(ClassFileError::InvalidStackMapFrameType(frame_type)),
        })
    }

    fn parse_verification_type(&mut self) -> Result<VerificationType> {
        let tag = self.read_u8()?;

        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object {
                cpool_index: self.read_u16()?,
            },
            8 => VerificationType::Uninitialized {
                offset: self.read_u16()?,
            },
            _ => return Err(ClassFileError::InvalidVerificationTypeTag(tag)),
        })
    }

    fn parse_inner_class(&mut self) -> Result<InnerClass> {
        let inner_class_info_index = self.read_u16()?;
        let outer_class_info_index = self.read_u16()?;
        let inner_name_index = self.read_u16()?;
        let inner_class_access_flags = self.read_u16()?;

        Ok(InnerClass {
            inner_class_info_index,
            outer_class_info_index,
            inner_name_index,
            inner_class_access_flags,
        })
    }

    fn parse_line_number(&mut self) -> Result<LineNumber> {
        let start_pc = self.read_u16()?;
        let line_number = self.read_u16()?;

        Ok(LineNumber {
            start_pc,
            line_number,
        })
    }

    fn parse_local_variables(&mut self) -> Result<Vec<LocalVariable>> {
        let table_length = self.read_u16()?;
        (0..table_length)
            .map(|_| {
                Ok(LocalVariable {
                    start_pc: self.read_u16()?,
                    length: self.read_u16()?,
                    name_index: self.read_u16()?,
                    descriptor_index: self.read_u16()?,
                    index: self.read_u16()?,
                })
            })
            .collect()
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let num_annotations = self.read_u16()?;
        (0..num_annotations)
            .map(|_| self.parse_annotation())
            .collect()
    }

    fn parse_parameter_annotations(&mut self) -> Result<Vec<Vec<Annotation>>> {
        let num_parameters = self.read_u8()?;
        (0..num_parameters)
            .map(|_| self.parse_annotations())
            .collect()
    }

    fn parse_annotation(&mut self) -> Result<Annotation> {
        let type_index = self.read_u16()?;
        let num_element_value_pairs = self.read_u16()?;
        let element_value_pairs = (0..num_element_value_pairs)
            .map(|_| {
                Ok(ElementValuePair {
                    element_name_index: self.read_u16()?,
                    value: self.parse_element_value()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Annotation {
            type_index,
            element_value_pairs,
        })
    }

    fn parse_element_value(&mut self) -> Result<ElementValue> {
        let tag = self.read_u8()?;

        Ok(match tag {
            b'B' => ElementValue::Byte {
                const_value_index: self.read_u16()?,
            },
            b'C' => ElementValue::Char {
                const_value_index: self.read_u16()?,
            },
            b'D' => ElementValue::Double {
                const_value_index: self.read_u16()?,
            },
            b'F' => ElementValue::Float {
                const_value_index: self.read_u16()?,
            },
            b'I' => ElementValue::Int {
                const_value_index: self.read_u16()?,
            },
            b'J' => ElementValue::Long {
                const_value_index: self.read_u16()?,
            },
            b'S' => ElementValue::Short {
                const_value_index: self.read_u16()?,
            },
            b'Z' => ElementValue::Boolean {
                const_value_index: self.read_u16()?,
            },
            b's' => ElementValue::String {
                const_value_index: self.read_u16()?,
            },
            b'e' => ElementValue::Enum {
                type_name_index: self.read_u16()?,
                const_name_index: self.read_u16()?,
            },
            b'c' => ElementValue::Class {
                class_info_index: self.read_u16()?,
            },
            b'@' => ElementValue::Annotation(self.nested(Self::parse_annotation)?),
            b'[' => {
                let num_values = self.read_u16()?;
                ElementValue::Array(self.nested(|p| {
                    (0..num_values)
                        .map(|_| p.parse_element_value())
                        .collect::<Result<Vec<_>>>()
                })?)
            }
            _ => return Err(ClassFileError::InvalidElementValueTag(tag)),
        })
    }

    fn parse_type_annotations(&mut self) -> Result<Vec<TypeAnnotation>> {
        let num_annotations = self.read_u16()?;
        (0..num_annotations)
            .map(|_| self.parse_type_annotation())
            .collect()
    }

    fn parse_type_annotation(&mut self) -> Result<TypeAnnotation> {
        let target_type = self.read_u8()?;
        let target_info = self.parse_target_info(target_type)?;
        let path_length = self.read_u8()?;
        let target_path = (0..path_length)
            .map(|_| {
                Ok(TypePathEntry {
                    type_path_kind: self.read_u8()?,
                    type_argument_index: self.read_u8()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let annotation = self.parse_annotation()?;

        Ok(TypeAnnotation {
            target_type,
            target_info,
            target_path,
            annotation,
        })
    }

    fn parse_target_info(&mut self, target_type: u8) -> Result<TargetInfo> {
        Ok(match target_type {
            0x00 | 0x01 => TargetInfo::TypeParameter {
                type_parameter_index: self.read_u8()?,
            },
            0x10 => TargetInfo::Supertype {
                supertype_index: self.read_u16()?,
            },
            0x11 | 0x12 => TargetInfo::TypeParameterBound {
                type_parameter_index: self.read_u8()?,
                bound_index: self.read_u8()?,
            },
            0x13..=0x15 => TargetInfo::Empty,
            0x16 => TargetInfo::FormalParameter {
                formal_parameter_index: self.read_u8()?,
            },
            0x17 => TargetInfo::Throws {
                throws_type_index: self.read_u16()?,
            },
            0x40 | 0x41 => {
                let table_length = self.read_u16()?;
                TargetInfo::LocalVar(
                    (0..table_length)
                        .map(|_| {
                            Ok(LocalVarTarget {
                                start_pc: self.read_u16()?,
                                length: self.read_u16()?,
                                index: self.read_u16()?,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            0x42 => TargetInfo::Catch {
                exception_table_index: self.read_u16()?,
            },
            0x43..=0x46 => TargetInfo::Offset {
                offset: self.read_u16()?,
            },
            0x47..=0x4b => TargetInfo::TypeArgument {
                offset: self.read_u16()?,
                type_argument_index: self.read_u8()?,
            },
            _ => return Err(ClassFileError::InvalidTargetType(target_type)),
        })
    }

    fn parse_bootstrap_method(&mut self) -> Result<BootstrapMethod> {
        let bootstrap_method_ref = self.read_u16()?;
        let num_bootstrap_arguments = self.read_u16()?;
        let bootstrap_arguments = self.read_u16_list(num_bootstrap_arguments)?;

        Ok(BootstrapMethod {
            bootstrap_method_ref,
            bootstrap_arguments,
        })
    }

    fn parse_method_parameter(&mut self) -> Result<MethodParameter> {
        let name_index = self.read_u16()?;
        let access_flags = self.read_u16()?;

        Ok(MethodParameter {
            name_index,
            access_flags,
        })
    }

    fn parse_module(&mut self) -> Result<Module> {
        let module_name_index = self.read_u16()?;
        let module_flags = self.read_u16()?;
        let module_version_index = self.read_u16()?;

        let requires_count = self.read_u16()?;
        let requires = (0..requires_count)
            .map(|_| {
                Ok(Requires {
                    requires_index: self.read_u16()?,
                    requires_flags: self.read_u16()?,
                    requires_version_index: self.read_u16()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let exports_count = self.read_u16()?;
        let exports = (0..exports_count)
            .map(|_| {
                let exports_index = self.read_u16()?;
                let exports_flags = self.read_u16()?;
                let exports_to_count = self.read_u16()?;
                Ok(Exports {
                    exports_index,
                    exports_flags,
                    exports_to_index: self.read_u16_list(exports_to_count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let opens_count = self.read_u16()?;
        let opens = (0..opens_count)
            .map(|_| {
                let opens_index = self.read_u16()?;
                let opens_flags = self.read_u16()?;
                let opens_to_count = self.read_u16()?;
                Ok(Opens {
                    opens_index,
                    opens_flags,
                    opens_to_index: self.read_u16_list(opens_to_count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let uses_count = self.read_u16()?;
        let uses_index = self.read_u16_list(uses_count)?;

        let provides_count = self.read_u16()?;
        let provides = (0..provides_count)
            .map(|_| {
                let provides_index = self.read_u16()?;
                let provides_with_count = self.read_u16()?;
                Ok(Provides {
                    provides_index,
                    provides_with_index: self.read_u16_list(provides_with_count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Module {
            module_name_index,
            module_flags,
            module_version_index,
            requires,
            exports,
            opens,
            uses_index,
            provides,
        })
    }

    fn parse_record_component(&mut self, constant_pool: &ConstantPool) -> Result<RecordComponent> {
        let name_index = self.read_u16()?;
        let descriptor_index = self.read_u16()?;
        let attributes_count = self.read_u16()?;
        let attributes = self.nested(|p| p.parse_attributes(attributes_count, constant_pool))?;

        Ok(RecordComponent {
            name_index,
            descriptor_index,
            attributes,
        })
    }
}
