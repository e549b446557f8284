//! Utility functions for code generation

use syn::{GenericArgument, PathArguments, Type};

/// Convert string to SCREAMING_SNAKE_CASE, used for column constants
pub fn screaming_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() && i > 0 && !result.ends_with('_') {
            result.push('_');
        }
        result.extend(c.to_uppercase());
    }
    result
}

/// Outer wrapper of a field type, as far as join shapes are concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    Vec,
    Option,
    Bare,
}

/// Classify a type by its last path segment (`Vec<T>`, `Option<T>`, anything else)
pub fn wrapper_of(ty: &Type) -> Wrapper {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            let has_arg = matches!(
                &segment.arguments,
                PathArguments::AngleBracketed(args)
                    if args.args.iter().any(|a| matches!(a, GenericArgument::Type(_)))
            );
            if has_arg && segment.ident == "Vec" {
                return Wrapper::Vec;
            }
            if has_arg && segment.ident == "Option" {
                return Wrapper::Option;
            }
        }
    }
    Wrapper::Bare
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(screaming_snake_case("user_id"), "USER_ID");
        assert_eq!(screaming_snake_case("name"), "NAME");
        assert_eq!(screaming_snake_case("createdAt"), "CREATED_AT");
    }

    #[test]
    fn test_wrapper_of() {
        let ty: Type = syn::parse_quote!(Vec<Post>);
        assert_eq!(wrapper_of(&ty), Wrapper::Vec);
        let ty: Type = syn::parse_quote!(std::option::Option<Author>);
        assert_eq!(wrapper_of(&ty), Wrapper::Option);
        let ty: Type = syn::parse_quote!(Author);
        assert_eq!(wrapper_of(&ty), Wrapper::Bare);
    }
}
