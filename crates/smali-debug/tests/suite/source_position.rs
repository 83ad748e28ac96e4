use smali_debug::{NoMappingReason, NodeRef, PositionError, SmaliFileBuilder};

use crate::harness::{foo_smali, location, Fixture};

#[test]
fn code_index_maps_to_line_of_eleventh_instruction() {
    let fx = Fixture::new();
    let file = fx.add_file(foo_smali());

    let pos = fx
        .manager
        .source_position(&location("com.example.Foo", "bar", "()V", 10))
        .expect("mapped");

    assert_eq!(pos.file, file);
    assert_eq!(pos.line, fx.line_of(file, "const/4 v0, 0xa"));
    assert_eq!(
        pos.element,
        NodeRef::Instruction {
            method: 0,
            index: 10
        }
    );
}

#[test]
fn descriptor_spelling_of_declaring_type_is_accepted() {
    let fx = Fixture::new();
    let file = fx.add_file(foo_smali());

    let pos = fx
        .manager
        .source_position(&location("Lcom/example/Foo;", "baz", "(I)I", 2))
        .expect("mapped");
    assert_eq!(pos.line, fx.line_of(file, "return v0"));
}

#[test]
fn unknown_type_and_method_have_no_mapping() {
    let fx = Fixture::new();
    fx.add_file(foo_smali());

    let err = fx
        .manager
        .source_position(&location("com.example.Missing", "bar", "()V", 0))
        .expect_err("unknown type");
    assert!(matches!(
        err,
        PositionError::NoMapping(NoMappingReason::UnknownType(ref name))
            if name == "com.example.Missing"
    ));

    let err = fx
        .manager
        .source_position(&location("com.example.Foo", "bar", "(I)V", 0))
        .expect_err("unknown overload");
    assert!(matches!(
        err,
        PositionError::NoMapping(NoMappingReason::UnknownMethod { .. })
    ));
}

#[test]
fn ambiguous_class_resolves_to_first_file() {
    let fx = Fixture::new();
    let first = fx.add_file(foo_smali());
    let second = fx.add_file(
        SmaliFileBuilder::new("Lcom/example/Foo;")
            .path("other/com/example/Foo.smali")
            .method("bar", "()V", |m| {
                m.instruction("return-void", 1);
            })
            .build(),
    );
    assert!(first < second);

    let pos = fx
        .manager
        .source_position(&location("com.example.Foo", "bar", "()V", 0))
        .expect("ambiguity is not an error");
    assert_eq!(pos.file, first);
}

#[test]
fn edited_file_is_seen_by_the_next_query() {
    let fx = Fixture::new();
    let file = fx.add_file(foo_smali());

    fx.edit_file(
        file,
        SmaliFileBuilder::new("Lcom/example/Foo;")
            .method("bar", "()V", |m| {
                m.instruction("const-wide v0, 0x1", 5)
                    .instruction("return-void", 1);
            })
            .build(),
    );

    let pos = fx
        .manager
        .source_position(&location("com.example.Foo", "bar", "()V", 5))
        .expect("mapped");
    assert_eq!(pos.line, fx.line_of(file, "return-void"));
}

#[test]
fn stale_index_entry_for_removed_file_is_no_mapping() {
    let fx = Fixture::new();
    let file = fx.add_file(foo_smali());
    fx.remove_file(file, false);

    let err = fx
        .manager
        .source_position(&location("com.example.Foo", "bar", "()V", 0))
        .expect_err("file removed");
    assert!(err.is_no_mapping());
}
