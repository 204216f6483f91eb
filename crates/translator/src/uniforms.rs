use std::fmt;

use serde::ser::{Serialize, Serializer};

use crate::lexer::{Lexer, TokenKind};

/// Uniforms every translated program declares.
///
/// The emitted block layout is mirrored by `FrameUniforms` in the renderer;
/// the two must change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardUniform {
    Resolution,
    Time,
    TimeDelta,
    Frame,
    Mouse,
    Date,
}

impl StandardUniform {
    pub const ALL: [StandardUniform; 6] = [
        StandardUniform::Resolution,
        StandardUniform::Time,
        StandardUniform::TimeDelta,
        StandardUniform::Frame,
        StandardUniform::Mouse,
        StandardUniform::Date,
    ];

    /// Name the user code refers to.
    pub fn name(self) -> &'static str {
        match self {
            StandardUniform::Resolution => "iResolution",
            StandardUniform::Time => "iTime",
            StandardUniform::TimeDelta => "iTimeDelta",
            StandardUniform::Frame => "iFrame",
            StandardUniform::Mouse => "iMouse",
            StandardUniform::Date => "iDate",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|uniform| uniform.name() == name)
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for StandardUniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of standard uniforms a program actually reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformUsage(u8);

impl UniformUsage {
    pub fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::ALL_BITS
    }

    const ALL_BITS: UniformUsage = UniformUsage(0b11_1111);

    /// Collects every standard uniform named in `source`, ignoring comments
    /// and string literals.
    pub fn scan(source: &str) -> Self {
        let mut usage = Self::empty();
        for token in Lexer::new(source) {
            if token.kind != TokenKind::Ident {
                continue;
            }
            if let Some(uniform) = StandardUniform::from_name(token.text) {
                usage.insert(uniform);
            }
        }
        usage
    }

    pub fn insert(&mut self, uniform: StandardUniform) {
        self.0 |= uniform.bit();
    }

    pub fn contains(&self, uniform: StandardUniform) -> bool {
        self.0 & uniform.bit() != 0
    }

    pub fn union(self, other: UniformUsage) -> Self {
        Self(self.0 | other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = StandardUniform> + '_ {
        StandardUniform::ALL
            .into_iter()
            .filter(move |uniform| self.contains(*uniform))
    }
}

impl Serialize for UniformUsage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(StandardUniform::name))
    }
}

/// Length of a leading declaration in `line` that redeclares one of the
/// standard uniforms, through its `;`. Pasted ShaderToy sources sometimes
/// carry these; whatever follows the `;` is ordinary code.
pub(crate) fn standard_uniform_redeclaration(line: &str) -> Option<usize> {
    let mut tokens = Lexer::new(line);
    if !tokens.next()?.is_ident("uniform") {
        return None;
    }
    let mut redeclares = false;
    for token in tokens {
        match token.kind {
            TokenKind::Punct(';') => return redeclares.then_some(token.end()),
            TokenKind::Punct('{') | TokenKind::Punct('}') => return None,
            TokenKind::Ident => redeclares |= StandardUniform::from_name(token.text).is_some(),
            _ => {}
        }
    }
    None
}
