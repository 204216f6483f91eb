//! Rewrites single-function ShaderToy-style fragment shaders into programs
//! the renderer can compile.
//!
//! The accepted dialect is a file of optional `#define` lines, free-form
//! globals and helpers, and exactly one `void mainImage(out vec4, in vec2)`
//! definition. [`translate`] splits the file into those parts and wraps them
//! with a canonical header, the standard uniform block and a generated
//! `main` dispatcher:
//!
//! ```text
//!   source ──▶ strip header directives ──▶ extract #defines
//!                                               │
//!                      locate mainImage ◀───────┘
//!                             │ brace matching (comments/strings skipped)
//!                             ▼
//!        header + uniforms + defines + body + entry + dispatcher
//! ```

mod lexer;
mod program;
mod uniforms;

pub use program::ENTRY_POINT;
pub use uniforms::{StandardUniform, UniformUsage};

use serde::Serialize;

use lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    #[error("no `void mainImage(out vec4, in vec2)` definition found")]
    MissingEntryPoint,
    #[error("`mainImage` body is never closed ({depth} unmatched `{{`)")]
    UnmatchedBraces { depth: usize },
}

/// Result of splitting a shader source into its parts.
///
/// `body_before` and `body_after` hold the user's globals and helpers that
/// surround the entry point; together with `entry` they reproduce the
/// non-directive source in its original order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationUnit {
    defines: Vec<String>,
    body_before: String,
    entry: String,
    #[serde(skip)]
    entry_body_offset: usize,
    body_after: String,
    color_param: String,
    coord_param: String,
    uniforms: UniformUsage,
    program: String,
}

impl TranslationUnit {
    /// `#define` lines in discovery order, continuation lines included.
    pub fn defines(&self) -> &[String] {
        &self.defines
    }

    /// Globals and helper functions with the entry point excised.
    pub fn body(&self) -> String {
        let mut body = String::with_capacity(self.body_before.len() + self.body_after.len());
        body.push_str(&self.body_before);
        body.push_str(&self.body_after);
        body
    }

    /// Full entry-point definition, signature through closing brace.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// The braced body of the entry point.
    pub fn entry_body(&self) -> &str {
        &self.entry[self.entry_body_offset..]
    }

    /// Caller-chosen name of the output color parameter.
    pub fn color_param(&self) -> &str {
        &self.color_param
    }

    /// Caller-chosen name of the fragment coordinate parameter.
    pub fn coord_param(&self) -> &str {
        &self.coord_param
    }

    /// Standard uniforms read by the final program.
    pub fn uniforms(&self) -> UniformUsage {
        self.uniforms
    }

    /// The complete program handed to the shader compiler.
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn into_program(self) -> String {
        self.program
    }

    /// User code (without defines or stripped directives) in original order.
    pub fn reassemble(&self) -> String {
        let mut text = String::with_capacity(
            self.body_before.len() + self.entry.len() + self.body_after.len(),
        );
        text.push_str(&self.body_before);
        text.push_str(&self.entry);
        text.push_str(&self.body_after);
        text
    }
}

/// Translates a ShaderToy-style source into a renderer-compatible program.
///
/// Either the whole program is produced or an error is returned; there is no
/// partial output.
pub fn translate(source: &str) -> Result<TranslationUnit, TranslationError> {
    let prepared = prepare(source);
    let working = prepared.working.as_str();
    let tokens: Vec<Token<'_>> = Lexer::new(working).collect();
    let entry = locate_entry(&tokens)?;

    if (entry.next_index..tokens.len()).any(|index| match_signature(&tokens, index).is_some()) {
        tracing::warn!(
            entry = ENTRY_POINT,
            "entry point declared again after its definition; using the first definition"
        );
    }

    let body_before = working[..entry.start].to_string();
    let entry_text = working[entry.start..entry.end].to_string();
    let body_after = working[entry.end..].to_string();

    let mut body = String::with_capacity(body_before.len() + body_after.len());
    body.push_str(&body_before);
    body.push_str(&body_after);
    let assembled = program::assemble(&prepared.defines, &body, &entry_text);

    let mut user_code = prepared.defines.join("\n");
    user_code.push('\n');
    user_code.push_str(working);
    let uniforms =
        UniformUsage::scan(&user_code).union(UniformUsage::scan(program::DISPATCHER_USES));

    tracing::debug!(
        defines = prepared.defines.len(),
        stripped = prepared.stripped,
        body_bytes = body.len(),
        entry_bytes = entry_text.len(),
        "translated shader source"
    );

    Ok(TranslationUnit {
        defines: prepared.defines,
        body_before,
        entry_body_offset: entry.body_start - entry.start,
        entry: entry_text,
        body_after,
        color_param: entry.color_param,
        coord_param: entry.coord_param,
        uniforms,
        program: assembled,
    })
}

struct Prepared {
    working: String,
    defines: Vec<String>,
    stripped: usize,
}

/// Removes header directives and standard uniform redeclarations, and pulls
/// top-level `#define` lines (with their continuations) out of the text.
///
/// Lines inside block comments are left alone. Defines nested in a
/// preprocessor conditional, or following an `#undef`, stay where they are
/// so the conditional still selects between them.
fn prepare(source: &str) -> Prepared {
    let mut working = String::with_capacity(source.len());
    let mut defines = Vec::new();
    let mut stripped = 0;
    let mut in_comment = false;
    let mut conditional_depth = 0usize;
    let mut hoisting = true;
    let mut lines = source.lines();

    while let Some(line) = lines.next() {
        let starts_in_comment = in_comment;
        in_comment = lexer::block_comment_open_after(line, in_comment);
        if starts_in_comment {
            push_line(&mut working, line);
            continue;
        }

        let trimmed = line.trim_start();
        if is_header_directive(trimmed) {
            stripped += 1;
            continue;
        }
        if let Some(end) = uniforms::standard_uniform_redeclaration(trimmed) {
            stripped += 1;
            let rest = &trimmed[end..];
            if !rest.trim().is_empty() {
                push_line(&mut working, rest);
            }
            continue;
        }

        match directive_name(trimmed) {
            Some("if" | "ifdef" | "ifndef") => conditional_depth += 1,
            Some("endif") => conditional_depth = conditional_depth.saturating_sub(1),
            Some("undef") => hoisting = false,
            Some("define") if hoisting && conditional_depth == 0 && !in_comment => {
                let mut define = trimmed.trim_end().to_string();
                while define.ends_with('\\') {
                    let Some(next) = lines.next() else {
                        break;
                    };
                    in_comment = lexer::block_comment_open_after(next, in_comment);
                    define.push('\n');
                    define.push_str(next.trim_end());
                }
                defines.push(define);
                continue;
            }
            _ => {}
        }
        push_line(&mut working, line);
    }

    Prepared {
        working,
        defines,
        stripped,
    }
}

fn push_line(working: &mut String, line: &str) {
    working.push_str(line);
    working.push('\n');
}

fn is_header_directive(trimmed: &str) -> bool {
    if directive_name(trimmed) == Some("version") {
        return true;
    }
    trimmed
        .strip_prefix("precision")
        .is_some_and(|rest| rest.starts_with(char::is_whitespace))
}

/// Keyword of a preprocessor line, e.g. `ifdef` for `#  ifdef HQ`.
fn directive_name(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('#')?.trim_start();
    let end = rest
        .find(|ch: char| !ch.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

struct EntrySpan {
    /// Byte offset of `void`.
    start: usize,
    /// Byte offset of the opening `{`.
    body_start: usize,
    /// Byte offset one past the matching `}`.
    end: usize,
    /// First token index after the closing brace.
    next_index: usize,
    color_param: String,
    coord_param: String,
}

struct Signature {
    /// Index of the token following the closing `)`.
    after: usize,
    color_param: String,
    coord_param: String,
}

fn locate_entry(tokens: &[Token<'_>]) -> Result<EntrySpan, TranslationError> {
    let mut index = 0;
    while index < tokens.len() {
        let Some(signature) = match_signature(tokens, index) else {
            index += 1;
            continue;
        };

        let terminator = tokens[signature.after..]
            .iter()
            .position(|token| token.is_punct('{') || token.is_punct(';'))
            .map(|offset| signature.after + offset);
        let Some(open_index) = terminator else {
            return Err(TranslationError::MissingEntryPoint);
        };
        if tokens[open_index].is_punct(';') {
            // Forward declaration; keep looking for the definition.
            index = open_index + 1;
            continue;
        }

        let (close_index, end) = match_braces(tokens, open_index)?;
        return Ok(EntrySpan {
            start: tokens[index].start,
            body_start: tokens[open_index].start,
            end,
            next_index: close_index + 1,
            color_param: signature.color_param,
            coord_param: signature.coord_param,
        });
    }
    Err(TranslationError::MissingEntryPoint)
}

/// Returns the index and end offset of the `}` matching the `{` at `open`.
fn match_braces(tokens: &[Token<'_>], open: usize) -> Result<(usize, usize), TranslationError> {
    let mut depth = 0usize;
    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::Punct('{') => depth += 1,
            TokenKind::Punct('}') => {
                depth -= 1;
                if depth == 0 {
                    return Ok((index, token.end()));
                }
            }
            _ => {}
        }
    }
    Err(TranslationError::UnmatchedBraces { depth })
}

/// Matches `void mainImage(<out vec4> name, <in vec2> name)` at `index`.
///
/// Parameters are recognised by qualifier and type only; their names are
/// whatever the author chose.
fn match_signature(tokens: &[Token<'_>], index: usize) -> Option<Signature> {
    let head = tokens.get(index..index + 3)?;
    if !(head[0].is_ident("void") && head[1].is_ident(ENTRY_POINT) && head[2].is_punct('(')) {
        return None;
    }
    let (color_param, next) = match_param(tokens, index + 3, "vec4", ParamDirection::Out)?;
    if !tokens.get(next)?.is_punct(',') {
        return None;
    }
    let (coord_param, next) = match_param(tokens, next + 1, "vec2", ParamDirection::In)?;
    if !tokens.get(next)?.is_punct(')') {
        return None;
    }
    Some(Signature {
        after: next + 1,
        color_param,
        coord_param,
    })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ParamDirection {
    In,
    Out,
}

const PARAM_QUALIFIERS: [&str; 7] = ["in", "out", "inout", "const", "highp", "mediump", "lowp"];

fn match_param(
    tokens: &[Token<'_>],
    mut index: usize,
    ty: &str,
    direction: ParamDirection,
) -> Option<(String, usize)> {
    let mut writes = false;
    while let Some(token) = tokens.get(index) {
        if token.kind != TokenKind::Ident || !PARAM_QUALIFIERS.contains(&token.text) {
            break;
        }
        writes |= matches!(token.text, "out" | "inout");
        index += 1;
    }
    if writes != (direction == ParamDirection::Out) {
        return None;
    }
    if !tokens.get(index)?.is_ident(ty) {
        return None;
    }
    let name = tokens.get(index + 1)?;
    if name.kind != TokenKind::Ident || PARAM_QUALIFIERS.contains(&name.text) {
        return None;
    }
    Some((name.text.to_string(), index + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(text: &str) -> String {
        text.chars().filter(|ch| !ch.is_whitespace()).collect()
    }

    const SHADER: &str = r#"#version 300 es
precision highp float;
#define PI 3.14159
#define TAU (2.0 * PI)

float wave(float x) {
    return sin(x * TAU);
}

void mainImage( out vec4 fragColor, in vec2 fragCoord )
{
    vec2 uv = fragCoord / iResolution.xy;
    if (uv.x > 0.5) {
        fragColor = vec4(wave(iTime), uv, 1.0);
    } else {
        fragColor = vec4(0.0);
    }
}

float late(float y) { return y * 2.0; }
"#;

    #[test]
    fn partitions_defines_body_and_entry() {
        let unit = translate(SHADER).expect("translate");
        assert_eq!(unit.defines(), ["#define PI 3.14159", "#define TAU (2.0 * PI)"]);
        assert!(unit.entry().starts_with("void mainImage("));
        assert!(unit.entry().ends_with('}'));
        assert!(unit.entry_body().starts_with('{'));
        assert!(unit.body().contains("float wave(float x)"));
        assert!(unit.body().contains("float late(float y)"));
        assert!(!unit.body().contains("mainImage"));
        assert_eq!(unit.color_param(), "fragColor");
        assert_eq!(unit.coord_param(), "fragCoord");
    }

    #[test]
    fn reassembly_preserves_every_non_directive_character() {
        let unit = translate(SHADER).expect("translate");
        let expected: String = SHADER
            .lines()
            .filter(|line| {
                let trimmed = line.trim_start();
                !(trimmed.starts_with("#version")
                    || trimmed.starts_with("precision")
                    || trimmed.starts_with("#define"))
            })
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(squash(&unit.reassemble()), squash(&expected));
    }

    #[test]
    fn program_contains_each_part_once_in_order() {
        let unit = translate(SHADER).expect("translate");
        let program = unit.program();
        assert_eq!(program.matches("#version").count(), 1);
        assert!(!program.contains("300 es"));
        assert_eq!(program.matches("#define PI 3.14159").count(), 1);
        assert_eq!(program.matches("float wave(float x)").count(), 1);
        assert_eq!(program.matches("void mainImage(").count(), 1);

        let define = program.find("#define PI").expect("define");
        let helper = program.find("float late").expect("late helper");
        let entry = program.find("void mainImage(").expect("entry");
        let dispatcher = program.find("void main()").expect("dispatcher");
        assert!(define < helper && helper < entry && entry < dispatcher);
        assert!(program.contains("mainImage(fragscope_result, fragscope_coord);"));
    }

    #[test]
    fn parameter_names_are_not_assumed() {
        let source = "void mainImage(out vec4 c, vec2 p) { c = vec4(p, 0.0, 1.0); }";
        let unit = translate(source).expect("translate");
        assert_eq!(unit.color_param(), "c");
        assert_eq!(unit.coord_param(), "p");

        let qualified =
            "void mainImage(inout highp vec4 o, const in mediump vec2 at) { o = vec4(at.x); }";
        let unit = translate(qualified).expect("translate qualified");
        assert_eq!(unit.color_param(), "o");
        assert_eq!(unit.coord_param(), "at");
    }

    #[test]
    fn braces_in_comments_and_strings_do_not_perturb_depth() {
        let source = r#"
void mainImage(out vec4 color, in vec2 coord) {
    // closing } in a line comment
    /* opening { and { in a block comment */
    const char* label = "}}}{";
    if (coord.x > 1.0) { color = vec4(1.0); }
    color = vec4(0.5);
}
float after() { return 1.0; }
"#;
        let unit = translate(source).expect("translate");
        assert!(unit.entry().ends_with("color = vec4(0.5);\n}"));
        assert!(unit.body().contains("float after()"));
    }

    #[test]
    fn prototypes_are_skipped() {
        let source = r"
void mainImage(out vec4 color, in vec2 coord);
float helper() { return 0.25; }
void mainImage(out vec4 color, in vec2 coord) { color = vec4(helper()); }
";
        let unit = translate(source).expect("translate");
        assert!(unit.entry().contains("helper()"));
        assert!(unit.body().contains("void mainImage(out vec4 color, in vec2 coord);"));
    }

    #[test]
    fn commented_out_entry_point_is_ignored() {
        let source = "// void mainImage(out vec4 c, in vec2 p) { }\nfloat x = 1.0;";
        assert_eq!(translate(source), Err(TranslationError::MissingEntryPoint));
    }

    #[test]
    fn missing_entry_point_is_reported() {
        assert_eq!(
            translate("float helper() { return 1.0; }"),
            Err(TranslationError::MissingEntryPoint)
        );
        assert_eq!(
            translate("void mainImage(out vec4 c, in vec2 p);"),
            Err(TranslationError::MissingEntryPoint)
        );
        assert_eq!(
            translate("void mainImage(in vec4 c, in vec2 p) { }"),
            Err(TranslationError::MissingEntryPoint)
        );
    }

    #[test]
    fn truncated_entry_point_reports_unmatched_braces() {
        let source = "void mainImage(out vec4 c, in vec2 p) {\n    if (p.x > 0.0) {\n        c = vec4(1.0);\n";
        assert_eq!(
            translate(source),
            Err(TranslationError::UnmatchedBraces { depth: 2 })
        );
    }

    #[test]
    fn multi_line_defines_are_extracted_whole() {
        let source = "#define SHADE(x) \\\n    ((x) * 0.5)\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(SHADE(p.x)); }";
        let unit = translate(source).expect("translate");
        assert_eq!(unit.defines(), ["#define SHADE(x) \\\n    ((x) * 0.5)"]);
        assert!(!unit.body().contains("0.5"));
    }

    const CONDITIONAL_DEFINES: &str = "#define HQ\n#ifdef HQ\n#define STEPS 64\n#else\n#define STEPS 8\n#endif\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(float(STEPS) / 64.0); }\n";

    #[test]
    fn defines_inside_conditionals_stay_in_place() {
        let unit = translate(CONDITIONAL_DEFINES).expect("translate");
        assert_eq!(unit.defines(), ["#define HQ"]);
        assert!(unit
            .body()
            .contains("#ifdef HQ\n#define STEPS 64\n#else\n#define STEPS 8\n#endif"));

        let program = unit.program();
        assert_eq!(program.matches("#define STEPS 64").count(), 1);
        let hq = program.find("#define HQ").expect("hoisted define");
        let conditional = program.find("#ifdef HQ").expect("conditional");
        assert!(hq < conditional);
    }

    #[test]
    fn nested_conditionals_and_undef_stop_hoisting() {
        let source = "#if 1\n#ifdef A\n#define X 1\n#endif\n#define Y 2\n#endif\n#define Z 3\n#undef Z\n#define Z 4\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(Z); }";
        let unit = translate(source).expect("translate");
        assert_eq!(unit.defines(), ["#define Z 3"]);
        let body = unit.body();
        assert!(body.contains("#define X 1"));
        assert!(body.contains("#define Y 2"));
        assert!(body.contains("#undef Z\n#define Z 4"));
    }

    #[test]
    fn block_comments_are_left_untouched() {
        let source = "/*\n#define DISABLED 1\nuniform float iTime;\n*/\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(iTime); }";
        let unit = translate(source).expect("translate");
        assert!(unit.defines().is_empty());
        assert!(unit.body().contains("#define DISABLED 1\nuniform float iTime;\n*/"));
    }

    #[test]
    fn code_after_a_redeclaration_is_kept() {
        let source = "uniform float iTime; float pulse() { return sin(iTime); }\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(pulse()); }";
        let unit = translate(source).expect("translate");
        assert!(!unit.program().contains("uniform float iTime;"));
        assert!(unit.body().contains("float pulse() { return sin(iTime); }"));
    }

    #[test]
    fn standard_uniform_redeclarations_are_stripped() {
        let source = "uniform float iTime;\nuniform vec3 iResolution;\nuniform float speed;\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(iTime * speed); }";
        let unit = translate(source).expect("translate");
        assert!(!unit.program().contains("uniform float iTime;"));
        assert!(unit.program().contains("uniform float speed;"));
    }

    #[test]
    fn reports_used_uniforms() {
        let unit = translate("void mainImage(out vec4 c, in vec2 p) { c = vec4(iTime, iMouse.xy, 1.0); }")
            .expect("translate");
        let usage = unit.uniforms();
        assert!(usage.contains(StandardUniform::Time));
        assert!(usage.contains(StandardUniform::Mouse));
        // The dispatcher always reads the resolution.
        assert!(usage.contains(StandardUniform::Resolution));
        assert!(!usage.contains(StandardUniform::Date));
        assert!(!usage.contains(StandardUniform::Frame));
    }

    #[test]
    fn serializes_parts_for_inspection() {
        let unit = translate("#define K 2.0\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(K); }")
            .expect("translate");
        let value = serde_json::to_value(&unit).expect("serialize");
        assert_eq!(value["defines"][0], "#define K 2.0");
        assert_eq!(value["color_param"], "c");
        assert!(value["program"].as_str().is_some_and(|program| program.contains("void main()")));
    }
}
