use chumsky::span::SimpleSpan;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct SourceId(pub usize);

impl SourceId {
    pub const SYNTHETIC: SourceId = SourceId(0);
}

pub type Span = SimpleSpan<usize, SourceId>;

/// A parsed `.weft` file. One file declares exactly one package.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub package: PackageDecl,
    pub imports: Vec<ImportDecl>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl {
    pub name: String,
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Struct(StructDecl),
    Interface(InterfaceDecl),
    Func(FuncDecl),
    Const(ConstDecl),
    Set(SetDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Struct(d) => d.span,
            Decl::Interface(d) => d.span,
            Decl::Func(d) => d.span,
            Decl::Const(d) => d.span,
            Decl::Set(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub impls: Vec<TypePath>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

/// A struct field. A backtick tag of `-` opts the field out of injection.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub tag: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub name: String,
    pub span: Span,
}

/// A function declaration. A body makes it an injector candidate; without a
/// body it is an external declaration usable as a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub rets: Vec<Ret>,
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub variadic: bool,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetKind {
    Type(TypeExpr),
    Cleanup,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ret {
    pub kind: RetKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// `let Name = Set(...)` — a named provider set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDecl {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Return(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span,
            Stmt::Return(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

impl TypeExpr {
    pub(crate) fn new(kind: TypeExprKind, span: Span) -> Self {
        TypeExpr { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Path(TypePath),
    Pointer(Box<TypeExpr>),
}

/// A possibly package-qualified name, such as `Config` or `db.Pool`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypePath {
    pub qualifier: Option<String>,
    pub name: String,
    pub span: Span,
}

impl fmt::Display for TypePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub(crate) fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StringLit(String),
    Path(TypePath),
    /// `&expr`
    Ref(Box<Expr>),
    FieldAccess(Box<Expr>, String),
    StructLit(TypePath, Vec<(String, Expr)>),
    Call(TypePath, Vec<Expr>),
    /// A pointer type written in expression position, such as `*Logger` in
    /// `Bind(*Logger, *FileLogger)`. Only marker constructs accept these.
    TypeRef(TypeExpr),
}
