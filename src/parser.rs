pub mod ast;

use crate::lexer::{Token, TokenKind};
use ast::{
    ConstDecl, Decl, Expr, ExprKind, FieldDecl, File, FuncDecl, ImportDecl, InterfaceDecl,
    PackageDecl, Param, Ret, RetKind, SetDecl, Span, StructDecl, Stmt, TypeExpr, TypeExprKind,
    TypePath,
};
use chumsky::input::{BorrowInput, Input};
use chumsky::prelude::*;

type Err<'a> = extra::Err<Rich<'a, TokenKind, Span>>;

fn ident<'a, I>() -> impl Parser<'a, I, String, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    select_ref! { TokenKind::Identifier(name) => name.clone() }
}

fn string<'a, I>() -> impl Parser<'a, I, String, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    select_ref! { TokenKind::String(value) => value.clone() }
}

fn type_path<'a, I>() -> impl Parser<'a, I, TypePath, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    ident()
        .then(just(TokenKind::Dot).ignore_then(ident()).or_not())
        .map_with(|(first, second), extra| match second {
            Some(name) => TypePath {
                qualifier: Some(first),
                name,
                span: extra.span(),
            },
            None => TypePath {
                qualifier: None,
                name: first,
                span: extra.span(),
            },
        })
}

fn type_expr<'a, I>() -> impl Parser<'a, I, TypeExpr, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    recursive(|type_expr| {
        let pointer = just(TokenKind::Star)
            .ignore_then(type_expr)
            .map_with(|inner, extra| {
                TypeExpr::new(TypeExprKind::Pointer(Box::new(inner)), extra.span())
            });

        let named = type_path()
            .map_with(|path, extra| TypeExpr::new(TypeExprKind::Path(path), extra.span()));

        choice((pointer, named))
    })
}

pub fn expr<'a, I>() -> impl Parser<'a, I, Expr, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    recursive(|expr| {
        let literal = select_ref! {
            TokenKind::Integer(value) => ExprKind::IntLit(*value),
            TokenKind::Float(value) => ExprKind::FloatLit(*value),
            TokenKind::Boolean(value) => ExprKind::BoolLit(*value),
            TokenKind::String(value) => ExprKind::StringLit(value.clone()),
        }
        .map_with(|kind, extra| Expr::new(kind, extra.span()));

        let args = expr
            .clone()
            .separated_by(just(TokenKind::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen));

        let field_inits = ident()
            .then_ignore(just(TokenKind::Colon))
            .then(expr.clone())
            .separated_by(just(TokenKind::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace));

        // A path is a call when followed by `(`, a struct literal when
        // followed by `{`, and a plain reference otherwise.
        let path_like = type_path()
            .then(choice((
                args.map(PathSuffix::Call),
                field_inits.map(PathSuffix::StructLit),
                empty().to(PathSuffix::None),
            )))
            .map_with(|(path, suffix), extra| {
                let kind = match suffix {
                    PathSuffix::Call(args) => ExprKind::Call(path, args),
                    PathSuffix::StructLit(inits) => ExprKind::StructLit(path, inits),
                    PathSuffix::None => ExprKind::Path(path),
                };
                Expr::new(kind, extra.span())
            });

        let reference = just(TokenKind::Amp)
            .ignore_then(expr.clone())
            .map_with(|inner, extra| Expr::new(ExprKind::Ref(Box::new(inner)), extra.span()));

        // `*T` / `**T` in expression position: a pointer type handed to a
        // marker construct.
        let type_ref = just(TokenKind::Star)
            .repeated()
            .at_least(1)
            .count()
            .then(type_path())
            .map_with(|(stars, path), extra| {
                let span = extra.span();
                let mut texpr = TypeExpr::new(TypeExprKind::Path(path), span);
                for _ in 0..stars {
                    texpr = TypeExpr::new(TypeExprKind::Pointer(Box::new(texpr)), span);
                }
                Expr::new(ExprKind::TypeRef(texpr), span)
            });

        let primary = choice((literal, reference, type_ref, path_like));

        primary.foldl_with(
            just(TokenKind::Dot).ignore_then(ident()).repeated(),
            |receiver, field, extra| {
                Expr::new(
                    ExprKind::FieldAccess(Box::new(receiver), field),
                    extra.span(),
                )
            },
        )
    })
}

#[derive(Clone)]
enum PathSuffix {
    Call(Vec<Expr>),
    StructLit(Vec<(String, Expr)>),
    None,
}

fn struct_decl<'a, I>() -> impl Parser<'a, I, StructDecl, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    let field = ident()
        .then_ignore(just(TokenKind::Colon))
        .then(type_expr())
        .then(select_ref! { TokenKind::Tag(tag) => tag.clone() }.or_not())
        .map_with(|((name, ty), tag), extra| FieldDecl {
            name,
            ty,
            tag,
            span: extra.span(),
        });

    let impls = just(TokenKind::Impl)
        .ignore_then(
            type_path()
                .separated_by(just(TokenKind::Comma))
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .or_not()
        .map(Option::unwrap_or_default);

    just(TokenKind::Struct)
        .ignore_then(ident())
        .then(impls)
        .then(
            field
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace)),
        )
        .map_with(|((name, impls), fields), extra| StructDecl {
            name,
            impls,
            fields,
            span: extra.span(),
        })
}

fn func_decl<'a, I>() -> impl Parser<'a, I, FuncDecl, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    let param = ident()
        .then_ignore(just(TokenKind::Colon))
        .then(just(TokenKind::Ellipsis).or_not())
        .then(type_expr())
        .map_with(|((name, variadic), ty), extra| Param {
            name,
            variadic: variadic.is_some(),
            ty,
            span: extra.span(),
        });

    let ret = choice((
        just(TokenKind::Cleanup).to(RetKind::Cleanup),
        just(TokenKind::Error).to(RetKind::Error),
        type_expr().map(RetKind::Type),
    ))
    .map_with(|kind, extra| Ret {
        kind,
        span: extra.span(),
    });

    let rets = choice((
        ret.clone()
            .separated_by(just(TokenKind::Comma))
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen)),
        ret.map(|ret| vec![ret]),
    ));

    let stmt = choice((
        just(TokenKind::Return).map_with(|_, extra| Stmt::Return(extra.span())),
        expr().map(Stmt::Expr),
    ));

    let body = stmt
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace));

    just(TokenKind::Fn)
        .ignore_then(ident())
        .then(
            param
                .separated_by(just(TokenKind::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen)),
        )
        .then(just(TokenKind::Arrow).ignore_then(rets).or_not())
        .then(body.or_not())
        .map_with(|(((name, params), rets), body), extra| FuncDecl {
            name,
            params,
            rets: rets.unwrap_or_default(),
            body,
            span: extra.span(),
        })
}

fn decl<'a, I>() -> impl Parser<'a, I, Decl, Err<'a>> + Clone
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    let interface = just(TokenKind::Interface)
        .ignore_then(ident())
        .map_with(|name, extra| InterfaceDecl {
            name,
            span: extra.span(),
        });

    let constant = just(TokenKind::Const)
        .ignore_then(ident())
        .then_ignore(just(TokenKind::Equal))
        .then(expr())
        .map_with(|(name, value), extra| ConstDecl {
            name,
            value,
            span: extra.span(),
        });

    let set = just(TokenKind::Let)
        .ignore_then(ident())
        .then_ignore(just(TokenKind::Equal))
        .then(expr())
        .map_with(|(name, value), extra| SetDecl {
            name,
            value,
            span: extra.span(),
        });

    choice((
        struct_decl().map(Decl::Struct),
        interface.map(Decl::Interface),
        func_decl().map(Decl::Func),
        constant.map(Decl::Const),
        set.map(Decl::Set),
    ))
}

fn file<'a, I>() -> impl Parser<'a, I, File, Err<'a>>
where
    I: BorrowInput<'a, Token = TokenKind, Span = Span>,
{
    let package = just(TokenKind::Package)
        .ignore_then(ident())
        .then(string())
        .map_with(|(name, path), extra| PackageDecl {
            name,
            path,
            span: extra.span(),
        });

    let import = just(TokenKind::Import)
        .ignore_then(string())
        .then(just(TokenKind::As).ignore_then(ident()).or_not())
        .map_with(|(path, alias), extra| ImportDecl {
            path,
            alias,
            span: extra.span(),
        });

    package
        .then(import.repeated().collect::<Vec<_>>())
        .then(decl().repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(|((package, imports), decls)| File {
            package,
            imports,
            decls,
        })
}

/// Parses a lexed `.weft` file.
pub fn parse_file<'a>(
    tokens: &'a [Token],
    eoi: Span,
) -> ParseResult<File, Rich<'a, TokenKind, Span>> {
    let input = tokens.map(eoi, |token| (&token.kind, &token.span));
    file().parse(input)
}

#[cfg(test)]
mod test;
