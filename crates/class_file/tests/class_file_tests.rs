mod common;

use classcheck_class_file::{
    attributes::{AttributeInfo, RawBytes},
    decode, AccessFlags, ClassFile, ClassFileError, CpInfo, ErrorKind, MemberKind, MAX_NESTING,
};

use common::{my_class, Bytes, ClassFileBuilder};

fn with_class_file(f: impl FnOnce(ClassFile)) {
    common::init_logger();
    f(decode(&my_class().build()).unwrap());
}

#[test]
fn test_version() {
    with_class_file(|class_file| {
        assert_eq!(52, class_file.major_version);
        assert_eq!(0, class_file.minor_version);
    });
}

#[test]
fn test_super_class() {
    with_class_file(|class_file| {
        assert_eq!(Some("java/lang/Object"), class_file.super_class().unwrap())
    });
}

#[test]
fn test_class_name() {
    with_class_file(|class_file| assert_eq!("my/MyClass", class_file.class_name().unwrap()));
}

#[test]
fn test_field_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "myField",
            class_file.member_name(&class_file.fields[0]).unwrap()
        )
    });
}

#[test]
fn test_int_field_type() {
    with_class_file(|class_file| {
        assert_eq!(
            "I",
            class_file.member_descriptor(&class_file.fields[0]).unwrap()
        )
    });
}

#[test]
fn test_field_access_flags() {
    with_class_file(|class_file| {
        assert_eq!(MemberKind::Field, class_file.fields[0].kind);
        assert_eq!(
            AccessFlags::FINAL | AccessFlags::PRIVATE,
            class_file.fields[0].access_flags
        )
    });
}

#[test]
fn test_constructor_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "<init>",
            class_file.member_name(&class_file.methods[0]).unwrap()
        )
    });
}

#[test]
fn test_constructor_descriptor() {
    with_class_file(|class_file| {
        assert_eq!(
            "()V",
            class_file.member_descriptor(&class_file.methods[0]).unwrap()
        )
    });
}

#[test]
fn test_method_name() {
    with_class_file(|class_file| {
        assert_eq!(
            "add",
            class_file.member_name(&class_file.methods[1]).unwrap()
        )
    });
}

#[test]
fn test_method_descriptor() {
    with_class_file(|class_file| {
        assert_eq!(
            "(I)F",
            class_file.member_descriptor(&class_file.methods[1]).unwrap()
        )
    });
}

#[test]
fn test_method_access_flags() {
    with_class_file(|class_file| {
        assert_eq!(MemberKind::Method, class_file.methods[1].kind);
        assert_eq!(AccessFlags::PUBLIC, class_file.methods[1].access_flags)
    });
}

#[test]
fn test_code() {
    with_class_file(|class_file| {
        let code = class_file.methods[0].attributes.code().unwrap();
        assert_eq!(RawBytes(vec![0x2a, 0xb7, 0x00, 0x01, 0xb1]), code.code);
        assert!(code.exception_table.is_empty());

        let line_numbers = code
            .attributes
            .find_by_name("LineNumberTable", &class_file.constant_pool)
            .unwrap();
        match &line_numbers.info {
            AttributeInfo::LineNumberTable(lines) => {
                assert_eq!(1, lines.len());
                assert_eq!(0, lines[0].start_pc);
                assert_eq!(3, lines[0].line_number);
            }
            info => panic!("unexpected attribute {:?}", info),
        }
    });
}

#[test]
fn test_source_file() {
    with_class_file(|class_file| {
        let source_file = class_file
            .attributes
            .find_by_name("SourceFile", &class_file.constant_pool)
            .unwrap();
        let AttributeInfo::SourceFile { sourcefile_index } = source_file.info else {
            panic!("unexpected attribute {:?}", source_file.info);
        };
        assert_eq!(
            "MyClass.java",
            class_file
                .constant_pool
                .utf8(sourcefile_index, "source file")
                .unwrap()
        );
        assert!(class_file
            .attributes
            .find_by_name("Deprecated", &class_file.constant_pool)
            .is_none());
    });
}

#[test]
fn test_describe() {
    with_class_file(|class_file| {
        assert_eq!("public super my.MyClass", class_file.describe().unwrap());
        assert_eq!(
            "private final int myField",
            class_file.fields[0]
                .describe(&class_file.constant_pool)
                .unwrap()
        );
        assert_eq!(
            "public float add(int)",
            class_file.methods[1]
                .describe(&class_file.constant_pool)
                .unwrap()
        );
    });
}

#[test]
fn test_describe_with_super_class_and_interfaces() {
    let mut builder = ClassFileBuilder::new("my/Child");
    builder.super_class = builder.class("my/Base");
    let serializable = builder.class("java/io/Serializable");
    let cloneable = builder.class("java/lang/Cloneable");
    builder.interfaces = vec![serializable, cloneable];
    builder.access_flags = 0x0031;

    let class_file = decode(&builder.build()).unwrap();
    assert_eq!(
        vec!["java/io/Serializable", "java/lang/Cloneable"],
        class_file.interface_names().unwrap()
    );
    assert_eq!(
        "public final super my.Child extends my.Base implements java.io.Serializable, java.lang.Cloneable",
        class_file.describe().unwrap()
    );
}

#[test]
fn test_long_takes_two_slots() {
    let mut builder = ClassFileBuilder::new("my/Constants");
    let long = builder.long(1 << 40);
    let after = builder.integer(7);
    assert_eq!(long + 2, after);

    let class_file = decode(&builder.build()).unwrap();
    let constant_pool = &class_file.constant_pool;
    assert_eq!(Some(&CpInfo::Long(1 << 40)), constant_pool.get(long));
    assert_eq!(Some(&CpInfo::Unusable), constant_pool.get(long + 1));
    assert_eq!(Some(&CpInfo::Integer(7)), constant_pool.get(after));
    assert_eq!(after as usize + 1, constant_pool.count());
}

#[test]
fn test_unknown_attribute_is_skipped() {
    let mut builder = my_class();
    let vendor = builder.attribute("MyVendorData", &[0xca, 0xfe, 0x00, 0x01, 0xff]);
    let signature_index = builder.utf8("Ljava/lang/Object;");
    let signature = builder.attribute("Signature", &Bytes::new().u2(signature_index).build());
    builder.class_attribute(vendor).class_attribute(signature);

    let class_file = decode(&builder.build()).unwrap();
    assert_eq!(3, class_file.attributes.len());
    assert!(matches!(
        &class_file.attributes.0[1].info,
        AttributeInfo::Unknown(RawBytes(bytes)) if bytes == &[0xca, 0xfe, 0x00, 0x01, 0xff]
    ));
    assert!(matches!(
        class_file.attributes.0[2].info,
        AttributeInfo::Signature { signature_index: i } if i == signature_index
    ));
    assert!(class_file.validate().is_ok());
}

#[test]
fn test_attribute_with_unresolved_name_is_kept() {
    let mut builder = my_class();
    let attribute = builder.attribute_at(builder.this_class, &[0x01, 0x02, 0x03]);
    builder.class_attribute(attribute);

    let class_file = decode(&builder.build()).unwrap();
    assert!(matches!(
        &class_file.attributes.0[1].info,
        AttributeInfo::Unknown(RawBytes(bytes)) if bytes.len() == 3
    ));
}

#[test]
fn test_trailing_data() {
    let mut bytes = my_class().build();
    bytes.push(0);

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, ClassFileError::TrailingData(1)));
    assert_eq!(ErrorKind::Bounds, err.kind());
}

#[test]
fn test_truncated_input() {
    let bytes = my_class().build();

    let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
    assert!(matches!(err, ClassFileError::Truncated(_)));
    assert_eq!(ErrorKind::Truncation, err.kind());
    assert!(!err.kind().is_content());
}

#[test]
fn test_invalid_magic_identifier() {
    let mut bytes = my_class().build();
    bytes[0] = 0xcb;

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        ClassFileError::InvalidMagicIdentifier(0xCBFEBABE)
    ));
    assert!(err.kind().is_content());
}

#[test]
fn test_attribute_length_mismatch() {
    let mut builder = my_class();
    let index = builder.utf8("MyClass.java");
    let source_file = builder.attribute("SourceFile", &Bytes::new().u2(index).u1(0).build());
    builder.class_attribute(source_file);

    assert!(matches!(
        decode(&builder.build()),
        Err(ClassFileError::AttributeLengthMismatch {
            declared: 3,
            actual: 2,
            ..
        })
    ));
}

#[test]
fn test_empty_code_is_rejected() {
    let mut builder = my_class();
    let code = builder.code(&[], &[]);
    builder.method(0x0401, "run", "()V", &[code]);

    let err = decode(&builder.build()).unwrap_err();
    assert!(matches!(err, ClassFileError::InvalidCodeLength(0)));
    assert_eq!(ErrorKind::Bounds, err.kind());
}

#[test]
fn test_record_components() {
    let mut builder = ClassFileBuilder::new("my/Point");
    let name_index = builder.utf8("x");
    let descriptor_index = builder.utf8("I");
    let payload = Bytes::new()
        .u2(1)
        .u2(name_index)
        .u2(descriptor_index)
        .u2(0)
        .build();
    let record = builder.attribute("Record", &payload);
    builder.class_attribute(record);

    let class_file = decode(&builder.build()).unwrap();
    match &class_file.attributes.0[0].info {
        AttributeInfo::Record(components) => {
            assert_eq!(1, components.len());
            assert_eq!(name_index, components[0].name_index);
            assert!(components[0].attributes.is_empty());
        }
        info => panic!("unexpected attribute {:?}", info),
    }
    assert!(class_file.validate().is_ok());
}

fn single_attribute(attribute: impl FnOnce(&mut ClassFileBuilder) -> Vec<u8>) -> ClassFile {
    common::init_logger();
    let mut builder = my_class();
    let attribute = attribute(&mut builder);
    builder.method(0x0401, "run", "(II)V", &[attribute]);
    decode(&builder.build()).unwrap()
}

fn method_attribute(class_file: &ClassFile) -> &AttributeInfo {
    &class_file.methods[2].attributes.0[0].info
}

#[test]
fn test_inner_classes() {
    let mut builder = my_class();
    let inner = builder.class("my/MyClass$Entry");
    let outer = builder.this_class;
    let name = builder.utf8("Entry");
    let payload = Bytes::new()
        .u2(2)
        .u2(inner)
        .u2(outer)
        .u2(name)
        .u2(0x0009)
        .u2(inner)
        .u2(0)
        .u2(0)
        .u2(0x0000)
        .build();
    let inner_classes = builder.attribute("InnerClasses", &payload);
    builder.class_attribute(inner_classes);

    let class_file = decode(&builder.build()).unwrap();
    match &class_file.attributes.0[1].info {
        AttributeInfo::InnerClasses(classes) => {
            assert_eq!(2, classes.len());
            assert_eq!(inner, classes[0].inner_class_info_index);
            assert_eq!(outer, classes[0].outer_class_info_index);
            assert_eq!(name, classes[0].inner_name_index);
            assert_eq!(0x0009, classes[0].inner_class_access_flags);
            assert_eq!(0, classes[1].outer_class_info_index);
            assert_eq!(0, classes[1].inner_name_index);
        }
        info => panic!("unexpected attribute {:?}", info),
    }
}

#[test]
fn test_enclosing_method() {
    let mut builder = ClassFileBuilder::new("my/Outer$1");
    let class = builder.class("my/Outer");
    let method = builder.name_and_type("run", "()V");
    let payload = Bytes::new().u2(class).u2(method).build();
    let enclosing_method = builder.attribute("EnclosingMethod", &payload);
    builder.class_attribute(enclosing_method);

    let class_file = decode(&builder.build()).unwrap();
    assert!(matches!(
        class_file.attributes.0[0].info,
        AttributeInfo::EnclosingMethod { class_index, method_index }
            if class_index == class && method_index == method
    ));
    assert!(class_file.validate().is_ok());
}

#[test]
fn test_method_parameters() {
    let mut name = 0;
    let class_file = single_attribute(|builder| {
        name = builder.utf8("count");
        let payload = Bytes::new().u1(2).u2(name).u2(0x0010).u2(0).u2(0x1000).build();
        builder.attribute("MethodParameters", &payload)
    });

    match method_attribute(&class_file) {
        AttributeInfo::MethodParameters(parameters) => {
            assert_eq!(2, parameters.len());
            assert_eq!(name, parameters[0].name_index);
            assert_eq!(0x0010, parameters[0].access_flags);
            assert_eq!(0, parameters[1].name_index);
            assert_eq!(0x1000, parameters[1].access_flags);
        }
        info => panic!("unexpected attribute {:?}", info),
    }
}

#[test]
fn test_method_parameters_count_is_one_byte() {
    let mut builder = my_class();
    let name = builder.utf8("count");
    // A two-byte count reads as zero parameters and leaves the entries unread.
    let payload = Bytes::new().u2(1).u2(name).u2(0).build();
    let method_parameters = builder.attribute("MethodParameters", &payload);
    builder.method(0x0401, "run", "(I)V", &[method_parameters]);

    let err = decode(&builder.build()).unwrap_err();
    assert!(matches!(
        err,
        ClassFileError::AttributeLengthMismatch {
            declared: 6,
            actual: 1,
            ..
        }
    ));
    assert_eq!(ErrorKind::Bounds, err.kind());
}

#[test]
fn test_parameter_annotations() {
    for name in [
        "RuntimeVisibleParameterAnnotations",
        "RuntimeInvisibleParameterAnnotations",
    ] {
        let mut type_index = 0;
        let class_file = single_attribute(|builder| {
            type_index = builder.utf8("Ljavax/annotation/Nonnull;");
            let payload = Bytes::new()
                .u1(2)
                .u2(1)
                .u2(type_index)
                .u2(0)
                .u2(0)
                .build();
            builder.attribute(name, &payload)
        });

        let parameters = match method_attribute(&class_file) {
            AttributeInfo::RuntimeVisibleParameterAnnotations(parameters)
            | AttributeInfo::RuntimeInvisibleParameterAnnotations(parameters) => parameters,
            info => panic!("unexpected attribute {:?}", info),
        };
        assert_eq!(2, parameters.len());
        assert_eq!(1, parameters[0].len());
        assert_eq!(type_index, parameters[0][0].type_index);
        assert!(parameters[0][0].element_value_pairs.is_empty());
        assert!(parameters[1].is_empty());
        assert!(class_file.validate().is_ok());
    }
}

#[test]
fn test_deeply_nested_annotation_default_is_rejected() {
    let mut builder = my_class();
    let value = builder.integer(1);
    let mut payload = Bytes::new();
    for _ in 0..15_000 {
        payload = payload.u1(b'[').u2(1);
    }
    let payload = payload.u1(b'I').u2(value).build();
    let annotation_default = builder.attribute("AnnotationDefault", &payload);
    builder.method(0x0401, "value", "()[I", &[annotation_default]);

    let err = decode(&builder.build()).unwrap_err();
    assert!(matches!(err, ClassFileError::NestingTooDeep(MAX_NESTING)));
    assert_eq!(ErrorKind::Bounds, err.kind());
}
