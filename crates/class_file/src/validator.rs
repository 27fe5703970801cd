use std::cell::Cell;

use log::{debug, trace};

use crate::{
    attributes::{
        Annotation, Attribute, AttributeInfo, Attributes, CodeAttribute, ElementValue, Module,
        StackMapFrame, TypeAnnotation, VerificationType,
    },
    class_file::MemberInfo,
    constant_pool::{ConstantTag, CpInfo, MethodHandleInfo, ReferenceKind},
    parser::MAX_NESTING,
    ClassFile, ClassFileError, ConstantPool, Result,
};

use ConstantTag::*;

/// The first major version (Java 8) whose `invokestatic` and `invokespecial`
/// method handles may point at interface methods.
pub const INTERFACE_METHOD_HANDLE_VERSION: u16 = 52;

const CONSTRUCTOR: &str = "<init>";
const STATIC_INITIALIZER: &str = "<clinit>";

/// Checks every constant pool reference of an already decoded class file.
///
/// Validation walks the tree depth first and stops at the first violation:
/// the pool, then this/super class and interfaces, then fields, methods and
/// finally the class attributes.
pub struct Validator<'a> {
    constant_pool: &'a ConstantPool,
    major_version: u16,
    depth: Cell<u16>,
}
impl<'a> Validator<'a> {
    pub fn new(constant_pool: &'a ConstantPool, major_version: u16) -> Self {
        Self {
            constant_pool,
            major_version,
            depth: Cell::new(0),
        }
    }

    /// Runs `f` one nesting level deeper, failing past [`MAX_NESTING`].
    fn nested(&self, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let depth = self.depth.get();
        if depth >= MAX_NESTING {
            return Err(ClassFileError::NestingTooDeep(MAX_NESTING));
        }

        self.depth.set(depth + 1);
        let res = f();
        self.depth.set(depth);
        res
    }

    pub fn validate_class_file(&self, class_file: &ClassFile) -> Result<()> {
        self.validate_constant_pool()?;

        self.constant_pool
            .expect(class_file.this_class, &[Class], "this class")?;
        self.constant_pool
            .expect_optional(class_file.super_class, &[Class], "super class")?;
        for &interface in &class_file.interfaces {
            self.constant_pool.expect(interface, &[Class], "interface")?;
        }

        for field in &class_file.fields {
            self.validate_member(field)?;
        }
        for method in &class_file.methods {
            self.validate_member(method)?;
        }
        self.validate_attributes(&class_file.attributes)?;

        debug!("class file is valid");
        Ok(())
    }

    pub fn validate_constant_pool(&self) -> Result<()> {
        for cp_info in self.constant_pool {
            self.validate_cp_info(cp_info)?;
        }

        trace!("{} constant pool slots are valid", self.constant_pool.count());
        Ok(())
    }

    fn validate_cp_info(&self, cp_info: &CpInfo) -> Result<()> {
        let cp = self.constant_pool;

        match cp_info {
            CpInfo::Utf8(_)
            | CpInfo::Integer(_)
            | CpInfo::Float(_)
            | CpInfo::Long(_)
            | CpInfo::Double(_)
            | CpInfo::Unusable => {}
            CpInfo::String { string_index } => {
                cp.expect(*string_index, &[Utf8], "string")?;
            }
            CpInfo::Class(info) => {
                cp.expect(info.name_index, &[Utf8], "class name")?;
            }
            CpInfo::Module(info) => {
                cp.expect(info.name_index, &[Utf8], "module name")?;
            }
            CpInfo::Package(info) => {
                cp.expect(info.name_index, &[Utf8], "package name")?;
            }
            CpInfo::FieldRef(info) | CpInfo::MethodRef(info) | CpInfo::InterfaceMethodRef(info) => {
                cp.expect(info.class_index, &[Class], "member reference class")?;
                cp.expect(
                    info.name_and_type_index,
                    &[NameAndType],
                    "member reference name and type",
                )?;
            }
            CpInfo::NameAndType(info) => {
                cp.expect(info.name_index, &[Utf8], "name and type name")?;
                cp.expect(info.descriptor_index, &[Utf8], "name and type descriptor")?;
            }
            CpInfo::MethodHandle(info) => self.validate_method_handle(info)?,
            CpInfo::MethodType(info) => {
                cp.expect(info.descriptor_index, &[Utf8], "method type descriptor")?;
            }
            CpInfo::Dynamic(info) | CpInfo::InvokeDynamic(info) => {
                cp.expect(
                    info.name_and_type_index,
                    &[NameAndType],
                    "dynamic name and type",
                )?;
            }
        }

        Ok(())
    }

    fn validate_method_handle(&self, info: &MethodHandleInfo) -> Result<()> {
        let kind = info
            .kind()
            .ok_or(ClassFileError::InvalidReferenceKind(info.reference_kind))?;

        let allowed: &[ConstantTag] = match kind {
            ReferenceKind::GetField
            | ReferenceKind::GetStatic
            | ReferenceKind::PutField
            | ReferenceKind::PutStatic => &[FieldRef],
            ReferenceKind::InvokeVirtual | ReferenceKind::NewInvokeSpecial => &[MethodRef],
            ReferenceKind::InvokeStatic | ReferenceKind::InvokeSpecial => {
                if self.major_version < INTERFACE_METHOD_HANDLE_VERSION {
                    &[MethodRef]
                } else {
                    &[MethodRef, InterfaceMethodRef]
                }
            }
            ReferenceKind::InvokeInterface => &[InterfaceMethodRef],
        };
        let reference = self
            .constant_pool
            .expect(info.reference_index, allowed, "method handle reference")?;

        if !kind.is_invoke() {
            return Ok(());
        }

        let name = match reference {
            CpInfo::MethodRef(r) | CpInfo::InterfaceMethodRef(r) => {
                let name_and_type = matches_cp_info!(
                    self.constant_pool,
                    r.name_and_type_index,
                    NameAndType,
                    "method handle name and type"
                )?;
                self.constant_pool
                    .utf8(name_and_type.name_index, "method handle name")?
            }
            _ => return Ok(()),
        };

        match kind {
            ReferenceKind::NewInvokeSpecial if name != CONSTRUCTOR => Err(
                ClassFileError::Violation(format!(
                    "method handle of kind {:?} must name {}, found {}",
                    kind, CONSTRUCTOR, name
                )),
            ),
            ReferenceKind::NewInvokeSpecial => Ok(()),
            _ if name == CONSTRUCTOR || name == STATIC_INITIALIZER => Err(
                ClassFileError::Violation(format!(
                    "method handle of kind {:?} must not name {}",
                    kind, name
                )),
            ),
            _ => Ok(()),
        }
    }

    pub fn validate_member(&self, member: &MemberInfo) -> Result<()> {
        self.constant_pool
            .expect(member.name_index, &[Utf8], "member name")?;
        self.constant_pool
            .expect(member.descriptor_index, &[Utf8], "member descriptor")?;
        self.validate_attributes(&member.attributes)
    }

    pub fn validate_attributes(&self, attributes: &Attributes) -> Result<()> {
        for attribute in attributes {
            self.validate_attribute(attribute)?;
        }
        Ok(())
    }

    fn validate_attribute(&self, attribute: &Attribute) -> Result<()> {
        let cp = self.constant_pool;
        let name = cp.utf8(attribute.attribute_name_index, "attribute name")?;
        trace!("validating attribute {}", name);

        match &attribute.info {
            AttributeInfo::ConstantValue {
                constantvalue_index,
            } => {
                cp.expect(
                    *constantvalue_index,
                    &[Integer, Float, Long, Double, String],
                    "constant value",
                )?;
            }
            AttributeInfo::Code(code) => self.validate_code(code)?,
            AttributeInfo::StackMapTable(frames) => {
                for frame in frames {
                    self.validate_stack_map_frame(frame)?;
                }
            }
            AttributeInfo::Exceptions(indices) => {
                for &index in indices {
                    cp.expect(index, &[Class], "exception class")?;
                }
            }
            AttributeInfo::InnerClasses(classes) => {
                for class in classes {
                    cp.expect(class.inner_class_info_index, &[Class], "inner class info")?;
                    cp.expect_optional(
                        class.outer_class_info_index,
                        &[Class],
                        "outer class info",
                    )?;
                    cp.expect_optional(class.inner_name_index, &[Utf8], "inner class name")?;
                }
            }
            AttributeInfo::EnclosingMethod {
                class_index,
                method_index,
            } => {
                cp.expect(*class_index, &[Class], "enclosing method class")?;
                cp.expect_optional(*method_index, &[NameAndType], "enclosing method")?;
            }
            AttributeInfo::Synthetic | AttributeInfo::Deprecated => {
                if attribute.attribute_length != 0 {
                    return Err(ClassFileError::Violation(format!(
                        "{} attribute must be empty, found {} bytes",
                        name, attribute.attribute_length
                    )));
                }
            }
            AttributeInfo::Signature { signature_index } => {
                cp.expect(*signature_index, &[Utf8], "signature")?;
            }
            AttributeInfo::SourceFile { sourcefile_index } => {
                cp.expect(*sourcefile_index, &[Utf8], "source file")?;
            }
            AttributeInfo::SourceDebugExtension(bytes) => {
                if cesu8::from_java_cesu8(&bytes.0).is_err() {
                    return Err(ClassFileError::Violation(
                        "source debug extension is not modified UTF-8".to_owned(),
                    ));
                }
            }
            AttributeInfo::LineNumberTable(_) => {}
            AttributeInfo::LocalVariableTable(variables) => {
                for variable in variables {
                    cp.expect(variable.name_index, &[Utf8], "local variable name")?;
                    cp.expect(
                        variable.descriptor_index,
                        &[Utf8],
                        "local variable descriptor",
                    )?;
                }
            }
            AttributeInfo::LocalVariableTypeTable(variables) => {
                for variable in variables {
                    cp.expect(variable.name_index, &[Utf8], "local variable type name")?;
                    cp.expect(
                        variable.descriptor_index,
                        &[Utf8],
                        "local variable type signature",
                    )?;
                }
            }
            AttributeInfo::RuntimeVisibleAnnotations(annotations)
            | AttributeInfo::RuntimeInvisibleAnnotations(annotations) => {
                for annotation in annotations {
                    self.validate_annotation(annotation)?;
                }
            }
            AttributeInfo::RuntimeVisibleParameterAnnotations(parameters)
            | AttributeInfo::RuntimeInvisibleParameterAnnotations(parameters) => {
                for annotation in parameters.iter().flatten() {
                    self.validate_annotation(annotation)?;
                }
            }
            AttributeInfo::RuntimeVisibleTypeAnnotations(annotations)
            | AttributeInfo::RuntimeInvisibleTypeAnnotations(annotations) => {
                for TypeAnnotation { annotation, .. } in annotations {
                    self.validate_annotation(annotation)?;
                }
            }
            AttributeInfo::AnnotationDefault(value) => self.validate_element_value(value)?,
            AttributeInfo::BootstrapMethods(methods) => {
                for method in methods {
                    cp.expect(
                        method.bootstrap_method_ref,
                        &[MethodHandle],
                        "bootstrap method",
                    )?;
                    // Any loadable constant is a valid argument.
                    for &argument in &method.bootstrap_arguments {
                        cp.entry(argument, "bootstrap argument")?;
                    }
                }
            }
            AttributeInfo::MethodParameters(parameters) => {
                for parameter in parameters {
                    cp.expect_optional(parameter.name_index, &[Utf8], "method parameter name")?;
                }
            }
            AttributeInfo::Module(module) => self.validate_module(module)?,
            AttributeInfo::ModulePackages(packages) => {
                for &package in packages {
                    cp.expect(package, &[Package], "module package")?;
                }
            }
            AttributeInfo::ModuleMainClass { main_class_index } => {
                cp.expect(*main_class_index, &[Class], "module main class")?;
            }
            AttributeInfo::NestHost { host_class_index } => {
                cp.expect(*host_class_index, &[Class], "nest host")?;
            }
            AttributeInfo::NestMembers(classes) => {
                for &class in classes {
                    cp.expect(class, &[Class], "nest member")?;
                }
            }
            AttributeInfo::PermittedSubclasses(classes) => {
                for &class in classes {
                    cp.expect(class, &[Class], "permitted subclass")?;
                }
            }
            AttributeInfo::Record(components) => {
                for component in components {
                    cp.expect(component.name_index, &[Utf8], "record component name")?;
                    cp.expect(
                        component.descriptor_index,
                        &[Utf8],
                        "record component descriptor",
                    )?;
                    self.nested(|| self.validate_attributes(&component.attributes))?;
                }
            }
            AttributeInfo::Unknown(_) => {}
        }

        Ok(())
    }

    fn validate_code(&self, code: &CodeAttribute) -> Result<()> {
        let code_length = code.code.0.len();
        let check_offset = |context: &'static str, offset: u16| {
            if offset as usize > code_length {
                Err(ClassFileError::InvalidCodeOffset {
                    context,
                    offset,
                    code_length,
                })
            } else {
                Ok(())
            }
        };

        for entry in &code.exception_table {
            check_offset("exception handler end", entry.end_pc)?;
            if entry.start_pc > entry.end_pc {
                return Err(ClassFileError::InvalidCodeRange {
                    context: "exception handler",
                    start_pc: entry.start_pc,
                    end_pc: entry.end_pc,
                });
            }
            check_offset("exception handler", entry.handler_pc)?;
            self.constant_pool
                .expect_optional(entry.catch_type, &[Class], "exception catch type")?;
        }

        self.nested(|| self.validate_attributes(&code.attributes))
    }

    fn validate_stack_map_frame(&self, frame: &StackMapFrame) -> Result<()> {
        for verification_type in frame.verification_types() {
            if let VerificationType::Object { cpool_index } = verification_type {
                self.constant_pool
                    .expect(*cpool_index, &[Class], "verification type object")?;
            }
        }
        Ok(())
    }

    fn validate_annotation(&self, annotation: &Annotation) -> Result<()> {
        self.constant_pool
            .expect(annotation.type_index, &[Utf8], "annotation type")?;
        for pair in &annotation.element_value_pairs {
            self.constant_pool
                .expect(pair.element_name_index, &[Utf8], "annotation element name")?;
            self.validate_element_value(&pair.value)?;
        }
        Ok(())
    }

    fn validate_element_value(&self, value: &ElementValue) -> Result<()> {
        let cp = self.constant_pool;

        match value {
            ElementValue::Byte { const_value_index }
            | ElementValue::Char { const_value_index }
            | ElementValue::Int { const_value_index }
            | ElementValue::Short { const_value_index }
            | ElementValue::Boolean { const_value_index } => {
                cp.expect(*const_value_index, &[Integer], "element value")?;
            }
            ElementValue::Double { const_value_index } => {
                cp.expect(*const_value_index, &[Double], "element value")?;
            }
            ElementValue::Float { const_value_index } => {
                cp.expect(*const_value_index, &[Float], "element value")?;
            }
            ElementValue::Long { const_value_index } => {
                cp.expect(*const_value_index, &[Long], "element value")?;
            }
            ElementValue::String { const_value_index } => {
                cp.expect(*const_value_index, &[Utf8], "element value")?;
            }
            ElementValue::Enum {
                type_name_index,
                const_name_index,
            } => {
                cp.expect(*type_name_index, &[Utf8], "enum type name")?;
                cp.expect(*const_name_index, &[Utf8], "enum constant name")?;
            }
            ElementValue::Class { class_info_index } => {
                cp.expect(*class_info_index, &[Utf8], "class literal")?;
            }
            ElementValue::Annotation(annotation) => {
                self.nested(|| self.validate_annotation(annotation))?
            }
            ElementValue::Array(values) => self.nested(|| {
                values
                    .iter()
                    .try_for_each(|value| self.validate_element_value(value))
            })?,
        }

        Ok(())
    }

    fn validate_module(&self, module: &Module) -> Result<()> {
        let cp = self.constant_pool;

        cp.expect(module.module_name_index, &[ConstantTag::Module], "module name")?;
        cp.expect_optional(module.module_version_index, &[Utf8], "module version")?;

        for requires in &module.requires {
            cp.expect(requires.requires_index, &[ConstantTag::Module], "requires")?;
            cp.expect_optional(requires.requires_version_index, &[Utf8], "requires version")?;
        }
        for exports in &module.exports {
            cp.expect(exports.exports_index, &[Package], "exports")?;
            for &to in &exports.exports_to_index {
                cp.expect(to, &[ConstantTag::Module], "exports to")?;
            }
        }
        for opens in &module.opens {
            cp.expect(opens.opens_index, &[Package], "opens")?;
            for &to in &opens.opens_to_index {
                cp.expect(to, &[ConstantTag::Module], "opens to")?;
            }
        }
        for &uses in &module.uses_index {
            cp.expect(uses, &[Class], "uses")?;
        }
        for provides in &module.provides {
            cp.expect(provides.provides_index, &[Class], "provides")?;
            for &with in &provides.provides_with_index {
                cp.expect(with, &[Class], "provides with")?;
            }
        }

        Ok(())
    }
}
