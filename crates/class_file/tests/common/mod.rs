//! Assembles class file images byte by byte, so tests need no compiled fixtures.
#![allow(dead_code)]

use byteorder::{BigEndian, WriteBytesExt};

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// Appends big-endian values to a byte buffer.
#[derive(Default, Clone)]
pub struct Bytes(pub Vec<u8>);
impl Bytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u1(mut self, v: u8) -> Self {
        self.0.write_u8(v).unwrap();
        self
    }

    pub fn u2(mut self, v: u16) -> Self {
        self.0.write_u16::<BigEndian>(v).unwrap();
        self
    }

    pub fn u4(mut self, v: u32) -> Self {
        self.0.write_u32::<BigEndian>(v).unwrap();
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

pub struct ClassFileBuilder {
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pool: Vec<u8>,
    slots: u16,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}
impl ClassFileBuilder {
    /// A `public super` class called `name` extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            major_version: 52,
            access_flags: 0x0021,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            pool: Vec::new(),
            slots: 0,
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    /// Appends a raw pool entry occupying `slots` slots and returns its index.
    pub fn entry(&mut self, bytes: &[u8], slots: u16) -> u16 {
        let index = self.slots + 1;
        self.pool.extend_from_slice(bytes);
        self.slots += slots;
        index
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        let bytes = Bytes::new().u1(1).u2(s.len() as u16).raw(s.as_bytes()).build();
        self.entry(&bytes, 1)
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        self.entry(&Bytes::new().u1(3).u4(v as u32).build(), 1)
    }

    pub fn long(&mut self, v: i64) -> u16 {
        let bytes = Bytes::new().u1(5).raw(&v.to_be_bytes()).build();
        self.entry(&bytes, 2)
    }

    pub fn string(&mut self, string_index: u16) -> u16 {
        self.entry(&Bytes::new().u1(8).u2(string_index).build(), 1)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.entry(&Bytes::new().u1(7).u2(name_index).build(), 1)
    }

    pub fn module(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.entry(&Bytes::new().u1(19).u2(name_index).build(), 1)
    }

    pub fn package(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.entry(&Bytes::new().u1(20).u2(name_index).build(), 1)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let bytes = Bytes::new().u1(12).u2(name_index).u2(descriptor_index).build();
        self.entry(&bytes, 1)
    }

    fn reference(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let name_and_type_index = self.name_and_type(name, descriptor);
        let bytes = Bytes::new()
            .u1(tag)
            .u2(class_index)
            .u2(name_and_type_index)
            .build();
        self.entry(&bytes, 1)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(9, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(10, class, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.reference(11, class, name, descriptor)
    }

    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        let bytes = Bytes::new().u1(15).u1(reference_kind).u2(reference_index).build();
        self.entry(&bytes, 1)
    }

    /// Encodes an attribute whose name index is given directly.
    pub fn attribute_at(&self, name_index: u16, payload: &[u8]) -> Vec<u8> {
        Bytes::new()
            .u2(name_index)
            .u4(payload.len() as u32)
            .raw(payload)
            .build()
    }

    pub fn attribute(&mut self, name: &str, payload: &[u8]) -> Vec<u8> {
        let name_index = self.utf8(name);
        self.attribute_at(name_index, payload)
    }

    /// A `Code` attribute with no exception table.
    pub fn code(&mut self, code: &[u8], attributes: &[Vec<u8>]) -> Vec<u8> {
        let payload = Bytes::new()
            .u2(1)
            .u2(1)
            .u4(code.len() as u32)
            .raw(code)
            .u2(0)
            .u2(attributes.len() as u16)
            .raw(&attributes.concat())
            .build();
        self.attribute("Code", &payload)
    }

    fn member(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> Vec<u8> {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        Bytes::new()
            .u2(access_flags)
            .u2(name_index)
            .u2(descriptor_index)
            .u2(attributes.len() as u16)
            .raw(&attributes.concat())
            .build()
    }

    pub fn field(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> &mut Self {
        let field = self.member(access_flags, name, descriptor, attributes);
        self.fields.push(field);
        self
    }

    pub fn method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &str,
        attributes: &[Vec<u8>],
    ) -> &mut Self {
        let method = self.member(access_flags, name, descriptor, attributes);
        self.methods.push(method);
        self
    }

    pub fn class_attribute(&mut self, attribute: Vec<u8>) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = Bytes::new()
            .u4(0xCAFEBABE)
            .u2(0)
            .u2(self.major_version)
            .u2(self.slots + 1)
            .raw(&self.pool)
            .u2(self.access_flags)
            .u2(self.this_class)
            .u2(self.super_class)
            .u2(self.interfaces.len() as u16);
        for &interface in &self.interfaces {
            bytes = bytes.u2(interface);
        }

        bytes
            .u2(self.fields.len() as u16)
            .raw(&self.fields.concat())
            .u2(self.methods.len() as u16)
            .raw(&self.methods.concat())
            .u2(self.attributes.len() as u16)
            .raw(&self.attributes.concat())
            .build()
    }
}

/// `my/MyClass` with a `private final int myField`, a constructor and
/// `public float add(int)`.
pub fn my_class() -> ClassFileBuilder {
    let mut builder = ClassFileBuilder::new("my/MyClass");

    builder.field(0x0012, "myField", "I", &[]);

    let line_numbers =
        builder.attribute("LineNumberTable", &Bytes::new().u2(1).u2(0).u2(3).build());
    let init_code = builder.code(&[0x2a, 0xb7, 0x00, 0x01, 0xb1], &[line_numbers]);
    builder.method(0x0001, "<init>", "()V", &[init_code]);

    let add_code = builder.code(&[0x1b, 0x86, 0xae], &[]);
    builder.method(0x0001, "add", "(I)F", &[add_code]);

    let source_file_index = builder.utf8("MyClass.java");
    let source_file =
        builder.attribute("SourceFile", &Bytes::new().u2(source_file_index).build());
    builder.class_attribute(source_file);

    builder
}
