use proc_macro2::Spacing;
use quote::quote;
use unsynn::*;

keyword! {
    KStruct = "struct";
    KPub = "pub";
    KJson = "json";
    KEmbed = "embed";
    KCrate = "crate";
}

operator! {
    /// Represents the ':' operator.
    Col = ":";
    /// Represents the '=' operator.
    Equals = "=";
}

unsynn! {
    /// Visibility: `pub`, `pub(...)` or nothing
    enum Vis {
        PubIn(Cons<KPub, ParenthesisGroup>),
        Pub(KPub),
    }

    /// Outer attribute: `#[...]`
    struct OuterAttr {
        _pound: Pound,
        content: BracketGroup,
    }

    /// `struct Name { ... }`; fields are split off the body separately
    struct StructDecl {
        attrs: Vec<OuterAttr>,
        _vis: Option<Vis>,
        _kw_struct: KStruct,
        name: Ident,
        body: BraceGroup,
    }

    /// One named field; the type is whatever follows the colon
    struct FieldDecl {
        attrs: Vec<OuterAttr>,
        _vis: Option<Vis>,
        name: Ident,
        _colon: Col,
        ty: Any<TokenTree>,
    }

    /// The inside of a `#[json(...)]` attribute
    struct JsonAttr {
        _json: KJson,
        arg: ParenthesisGroupContaining<Cons<JsonArg, EndOfStream>>,
    }

    enum JsonArg {
        Embed(KEmbed),
        Crate(Cons<KCrate, Cons<Equals, Any<TokenTree>>>),
        Tag(Literal),
    }
}

/// A struct ready for emission.
pub(crate) struct ParsedStruct {
    pub(crate) name: Ident,
    pub(crate) krate: TokenStream,
    pub(crate) fields: Vec<ParsedField>,
}

pub(crate) struct ParsedField {
    pub(crate) name: Ident,
    pub(crate) ty: TokenStream,
    pub(crate) tag: Option<Literal>,
    pub(crate) embedded: bool,
}

pub(crate) fn reflect(input: TokenStream) -> TokenStream {
    match parse(input) {
        Ok(parsed) => emit(&parsed),
        Err(msg) => quote! { ::core::compile_error!(#msg); },
    }
}

pub(crate) fn parse(input: TokenStream) -> std::result::Result<ParsedStruct, String> {
    let mut it = input.to_token_iter();
    let decl = match it.parse::<Cons<StructDecl, EndOfStream>>() {
        Ok(decl) => decl.first,
        Err(err) => {
            return Err(format!(
                "#[derive(Reflect)] supports non-generic structs with named fields: {err}"
            ));
        }
    };

    let mut krate = quote! { ::jsonplan };
    for arg in json_args(&decl.attrs)? {
        match arg {
            JsonArg::Crate(path) => krate = tokens_of(&path.second.second),
            _ => return Err("only `crate = path` is allowed on the struct".into()),
        }
    }

    let fields = split_fields(decl.body.0.stream())
        .into_iter()
        .map(parse_field)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(ParsedStruct {
        name: decl.name,
        krate,
        fields,
    })
}

fn parse_field(tokens: TokenStream) -> std::result::Result<ParsedField, String> {
    let field = tokens
        .to_token_iter()
        .parse::<FieldDecl>()
        .map_err(|err| format!("expected `name: Type`: {err}"))?;

    let mut parsed = ParsedField {
        ty: tokens_of(&field.ty),
        name: field.name,
        tag: None,
        embedded: false,
    };
    if parsed.ty.is_empty() {
        return Err(format!("field `{}` has no type", parsed.name));
    }
    for arg in json_args(&field.attrs)? {
        match arg {
            JsonArg::Embed(_) => parsed.embedded = true,
            JsonArg::Tag(tag) => parsed.tag = Some(tag),
            JsonArg::Crate(_) => {
                return Err(format!("`crate = ...` on field `{}`", parsed.name));
            }
        }
    }
    Ok(parsed)
}

/// The arguments of every `#[json(...)]` among `attrs`; other attributes
/// are left alone.
fn json_args(attrs: &[OuterAttr]) -> std::result::Result<Vec<JsonArg>, String> {
    let mut args = Vec::new();
    for attr in attrs {
        let stream = attr.content.0.stream();
        let is_json = matches!(
            stream.clone().into_iter().next(),
            Some(TokenTree::Ident(ident)) if ident == "json"
        );
        if !is_json {
            continue;
        }
        let parsed = stream
            .to_token_iter()
            .parse::<Cons<JsonAttr, EndOfStream>>()
            .map_err(|err| {
                format!("expected #[json(\"tag\")], #[json(embed)] or #[json(crate = path)]: {err}")
            })?;
        args.push(parsed.first.arg.content.first);
    }
    Ok(args)
}

/// Splits a struct body on the commas between fields. Commas inside
/// generic arguments (`HashMap<K, V>`) are not separators.
pub(crate) fn split_fields(body: TokenStream) -> Vec<TokenStream> {
    let mut fields = Vec::new();
    let mut current = Vec::new();
    let mut angle_depth = 0usize;
    let mut after_dash = false;
    for tt in body {
        if let TokenTree::Punct(p) = &tt {
            match p.as_char() {
                ',' if angle_depth == 0 => {
                    fields.push(current.drain(..).collect());
                    after_dash = false;
                    continue;
                }
                '<' => angle_depth += 1,
                // `->` in a fn pointer type closes nothing
                '>' if !after_dash => angle_depth = angle_depth.saturating_sub(1),
                _ => {}
            }
        }
        after_dash =
            matches!(&tt, TokenTree::Punct(p) if p.as_char() == '-' && p.spacing() == Spacing::Joint);
        current.push(tt);
    }
    if !current.is_empty() {
        fields.push(current.into_iter().collect());
    }
    fields
}

fn tokens_of(t: &impl unsynn::ToTokens) -> TokenStream {
    let mut tokens = TokenStream::new();
    t.to_tokens(&mut tokens);
    tokens
}

pub(crate) fn emit(parsed: &ParsedStruct) -> TokenStream {
    let ParsedStruct {
        name,
        krate,
        fields,
    } = parsed;
    let type_identifier = name.to_string();
    let fields = fields.iter().map(|field| {
        let ParsedField {
            name: field_name,
            ty,
            tag,
            embedded,
        } = field;
        let field_str = field_name.to_string();
        let tag = match tag {
            Some(tag) => quote! { #tag },
            None => quote! { "" },
        };
        quote! {
            #krate::Field {
                name: #field_str,
                tag: #tag,
                offset: ::core::mem::offset_of!(#name, #field_name),
                shape: #krate::shape_of::<#ty>,
                embedded: #embedded,
            }
        }
    });

    quote! {
        #[automatically_derived]
        unsafe impl #krate::Reflect for #name {
            const SHAPE: &'static #krate::Shape = &const {
                const FIELDS: &[#krate::Field] = &[#(#fields),*];
                #krate::Shape::new::<#name>(
                    #type_identifier,
                    #krate::Def::Struct(#krate::StructDef { fields: FIELDS }),
                    &const { #krate::ValueVTable::of::<#name>() },
                )
            };
        }
    }
}
