//! Emits smali text together with its structure.
//!
//! Used by tests and tooling that need a realistic [`SourceFile`] without a
//! smali parser. The text layout follows baksmali's output: top-level
//! directives at column 0, method bodies indented by four spaces.

use crate::model::{SmaliClass, SmaliInstruction, SmaliMethod, SourceFile, TextRange};
use crate::names;

const INDENT: &str = "    ";

/// Bytes per 16-bit Dalvik code unit.
const CODE_UNIT_BYTES: u64 = 2;

pub struct SmaliFileBuilder {
    path: Option<String>,
    class_name: String,
    text: String,
    methods: Vec<SmaliMethod>,
}

impl SmaliFileBuilder {
    /// Starts a file for `class_name` (descriptor or binary form).
    pub fn new(class_name: &str) -> Self {
        let class_name = names::descriptor(class_name).unwrap_or_else(|| class_name.to_string());
        let mut text = String::new();
        text.push_str(".class public ");
        text.push_str(&class_name);
        text.push('\n');
        text.push_str(".super Ljava/lang/Object;\n");
        Self {
            path: None,
            class_name,
            text,
            methods: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Appends a top-level directive line such as `.field private x:I`.
    pub fn directive(mut self, line: &str) -> Self {
        self.text.push('\n');
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    pub fn method(
        mut self,
        name: &str,
        descriptor: &str,
        body: impl FnOnce(&mut MethodBuilder<'_>),
    ) -> Self {
        self.text.push('\n');
        let start = self.text.len();
        self.text.push_str(".method public ");
        self.text.push_str(name);
        self.text.push_str(descriptor);
        self.text.push('\n');

        let mut builder = MethodBuilder {
            text: &mut self.text,
            code_offset: 0,
            instructions: Vec::new(),
        };
        body(&mut builder);
        let instructions = builder.instructions;

        self.text.push_str(".end method\n");
        self.methods.push(SmaliMethod {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            range: TextRange::new(start, self.text.len()),
            instructions,
        });
        self
    }

    pub fn build(self) -> SourceFile {
        let path = self.path.unwrap_or_else(|| default_path(&self.class_name));
        let class = SmaliClass {
            name: self.class_name,
            range: TextRange::new(0, self.text.len()),
            methods: self.methods,
        };
        SourceFile::smali(path, self.text, class)
    }
}

fn default_path(class_name: &str) -> String {
    let internal = class_name
        .strip_prefix('L')
        .and_then(|s| s.strip_suffix(';'))
        .unwrap_or(class_name);
    format!("{internal}.smali")
}

pub struct MethodBuilder<'a> {
    text: &'a mut String,
    code_offset: u64,
    instructions: Vec<SmaliInstruction>,
}

impl MethodBuilder<'_> {
    /// Non-executable line inside the body (`.registers 2`, `.line 12`, labels).
    pub fn directive(&mut self, line: &str) -> &mut Self {
        self.text.push_str(INDENT);
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.text.push('\n');
        self
    }

    /// Appends an instruction occupying `code_units` 16-bit code units.
    pub fn instruction(&mut self, line: &str, code_units: u64) -> &mut Self {
        self.text.push_str(INDENT);
        let start = self.text.len();
        self.text.push_str(line);
        let end = self.text.len();
        self.text.push('\n');

        self.instructions.push(SmaliInstruction {
            range: TextRange::new(start, end),
            code_offset: self.code_offset,
        });
        self.code_offset += code_units * CODE_UNIT_BYTES;
        self
    }

    /// Appends `count` single-unit `nop` instructions.
    pub fn nops(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            self.instruction("nop", 1);
        }
        self
    }
}
