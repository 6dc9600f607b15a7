// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Declaration parsing: imports, namespaces, types, and members.
//!
//! Each declared modifier set is validated here against a per-construct
//! allow-list, so the resolver only ever sees modifiers that are legal
//! for the construct they sit on. Declaration-space conflicts (duplicate
//! names, signature clashes) are *not* detected here — that is the
//! declaration space's job during resolution, when all files have been
//! merged.

use ecow::EcoString;

use crate::ast::{
    AttributeUsage, EnumMemberDeclaration, ImportDirective, MemberDeclaration, MemberKind,
    MethodDeclaration, Modifiers, NamespaceDeclaration, NamespaceMember, ParameterDeclaration,
    PropertyDeclaration, SourceUnit, TypeDeclKind, TypeDeclaration, TypeName,
};
use crate::diagnostics::codes;
use crate::source_analysis::{Keyword, Location, TokenKind};

use super::{DeclContext, Parser};

/// Modifiers legal on each construct.
mod allowed {
    use super::Modifiers;

    pub(super) const ACCESS: Modifiers = Modifiers::ACCESS_MASK;

    pub(super) const CLASS: Modifiers = ACCESS
        .union(Modifiers::SHADOWS)
        .union(Modifiers::MUST_INHERIT)
        .union(Modifiers::NOT_INHERITABLE);
    pub(super) const STRUCTURE: Modifiers = ACCESS.union(Modifiers::SHADOWS);
    pub(super) const INTERFACE: Modifiers = ACCESS.union(Modifiers::SHADOWS);
    pub(super) const MODULE: Modifiers = ACCESS;
    pub(super) const ENUM: Modifiers = ACCESS.union(Modifiers::SHADOWS);
    pub(super) const DELEGATE: Modifiers = ACCESS.union(Modifiers::SHADOWS);

    pub(super) const FIELD: Modifiers = ACCESS
        .union(Modifiers::SHARED)
        .union(Modifiers::SHADOWS)
        .union(Modifiers::READ_ONLY);
    pub(super) const CONSTANT: Modifiers = ACCESS.union(Modifiers::SHADOWS);
    pub(super) const METHOD: Modifiers = ACCESS
        .union(Modifiers::SHARED)
        .union(Modifiers::SHADOWS)
        .union(Modifiers::OVERRIDABLE)
        .union(Modifiers::OVERRIDES)
        .union(Modifiers::MUST_OVERRIDE)
        .union(Modifiers::NOT_OVERRIDABLE);
    pub(super) const CONSTRUCTOR: Modifiers = ACCESS.union(Modifiers::SHARED);
    pub(super) const PROPERTY: Modifiers = METHOD
        .union(Modifiers::READ_ONLY)
        .union(Modifiers::WRITE_ONLY);
    pub(super) const EVENT: Modifiers =
        ACCESS.union(Modifiers::SHARED).union(Modifiers::SHADOWS);
    pub(super) const PARAMETER: Modifiers = Modifiers::BY_VAL
        .union(Modifiers::BY_REF)
        .union(Modifiers::OPTIONAL)
        .union(Modifiers::PARAM_ARRAY);
}

impl Parser<'_> {
    /// Parses a whole source file.
    pub(super) fn parse_unit(&mut self, file: u16) -> SourceUnit {
        let context = DeclContext::default();
        let mut imports = Vec::new();
        let mut members = Vec::new();

        self.skip_terminators();
        while !self.is_at_end() {
            if self.at_keyword(Keyword::Imports) {
                if let Some(import) = self.parse_import(file) {
                    imports.push(import);
                }
                self.expect_terminator();
            } else if let Some(member) = self.parse_namespace_member(&context) {
                members.push(member);
            }
            self.skip_terminators();
        }

        SourceUnit {
            file,
            imports,
            members,
        }
    }

    fn parse_import(&mut self, file: u16) -> Option<ImportDirective> {
        let location = self.here();
        self.expect_keyword(Keyword::Imports);

        // `Imports alias = Target.Namespace` or `Imports Target.Namespace`.
        let alias = if let TokenKind::Identifier(name) = self.current_kind() {
            if self.peek_kind() == &TokenKind::Equals {
                let name = name.clone();
                self.advance();
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };

        if !matches!(self.current_kind(), TokenKind::Identifier(_)) {
            self.error("namespace or type name expected after 'Imports'");
            self.synchronize();
            return None;
        }
        let target = self.parse_qualified_name();
        Some(ImportDirective {
            alias,
            target,
            location,
            file,
        })
    }

    /// Parses one namespace-level member: a nested namespace or a type.
    fn parse_namespace_member(&mut self, context: &DeclContext) -> Option<NamespaceMember> {
        let attributes = self.parse_attributes();
        let modifiers = self.parse_modifiers();

        match self.current_kind() {
            TokenKind::Keyword(Keyword::Namespace) => {
                if !modifiers.is_empty() || !attributes.is_empty() {
                    self.error("a namespace cannot carry modifiers or attributes");
                }
                self.parse_namespace(context).map(NamespaceMember::Namespace)
            }
            TokenKind::Keyword(
                Keyword::Class
                | Keyword::Structure
                | Keyword::Interface
                | Keyword::Module
                | Keyword::Enum
                | Keyword::Delegate,
            ) => self
                .parse_type_declaration(context, attributes, modifiers)
                .map(NamespaceMember::Type),
            other => {
                if context.namespace.is_empty() {
                    self.error(format!("declaration expected, found '{other}'"));
                } else {
                    let namespace = context.namespace.join(".");
                    self.error(format!(
                        "declaration expected in namespace '{namespace}', found '{other}'"
                    ));
                }
                self.synchronize();
                None
            }
        }
    }

    fn parse_namespace(&mut self, context: &DeclContext) -> Option<NamespaceDeclaration> {
        let location = self.here();
        self.expect_keyword(Keyword::Namespace);
        let name = self.parse_qualified_name();
        self.expect_terminator();

        let nested = context.nested_namespace(&name);
        let mut members = Vec::new();
        self.skip_terminators();
        while !self.is_at_end() && !self.at_keyword(Keyword::End) {
            if let Some(member) = self.parse_namespace_member(&nested) {
                members.push(member);
            }
            self.skip_terminators();
        }
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Namespace);
        Some(NamespaceDeclaration {
            name,
            members,
            location,
        })
    }

    // === Types ===

    fn parse_type_declaration(
        &mut self,
        context: &DeclContext,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Option<TypeDeclaration> {
        match self.current_kind() {
            TokenKind::Keyword(Keyword::Class) => {
                self.check_modifiers(modifiers, allowed::CLASS, "class");
                self.advance();
                self.parse_class(context, attributes, modifiers, false)
            }
            TokenKind::Keyword(Keyword::Structure) => {
                self.check_modifiers(modifiers, allowed::STRUCTURE, "structure");
                self.advance();
                self.parse_class(context, attributes, modifiers, true)
            }
            TokenKind::Keyword(Keyword::Interface) => {
                self.check_modifiers(modifiers, allowed::INTERFACE, "interface");
                self.advance();
                self.parse_interface(context, attributes, modifiers)
            }
            TokenKind::Keyword(Keyword::Module) => {
                self.check_modifiers(modifiers, allowed::MODULE, "module");
                self.advance();
                self.parse_module(context, attributes, modifiers)
            }
            TokenKind::Keyword(Keyword::Enum) => {
                self.check_modifiers(modifiers, allowed::ENUM, "enumeration");
                self.advance();
                self.parse_enum(attributes, modifiers)
            }
            TokenKind::Keyword(Keyword::Delegate) => {
                self.check_modifiers(modifiers, allowed::DELEGATE, "delegate");
                self.advance();
                self.parse_delegate(attributes, modifiers)
            }
            _ => None,
        }
    }

    /// Parses a `Class` or `Structure` (they share a body grammar; a
    /// structure has no `Inherits` clause).
    fn parse_class(
        &mut self,
        context: &DeclContext,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
        is_structure: bool,
    ) -> Option<TypeDeclaration> {
        let location = self.here();
        let name = self.expect_identifier("type name");
        self.expect_terminator();
        self.skip_terminators();

        let mut inherits = None;
        let mut implements = Vec::new();
        loop {
            if self.at_keyword(Keyword::Inherits) {
                let inherits_location = self.here();
                self.advance();
                let base = self.parse_type_name();
                if is_structure {
                    self.error_at(inherits_location, "a structure cannot declare a base type");
                } else if inherits.is_some() {
                    self.error_at(inherits_location, "'Inherits' can appear only once");
                } else {
                    inherits = Some(base);
                }
            } else if self.at_keyword(Keyword::Implements) {
                self.advance();
                loop {
                    implements.push(self.parse_type_name());
                    if !self.match_token(&TokenKind::Comma) {
                        break;
                    }
                }
            } else {
                break;
            }
            self.expect_terminator();
            self.skip_terminators();
        }

        let body_context = context.inside_type(&name);
        let members = self.parse_type_body(&body_context, false);
        self.expect_keyword(Keyword::End);
        self.expect_keyword(if is_structure {
            Keyword::Structure
        } else {
            Keyword::Class
        });

        let kind = if is_structure {
            TypeDeclKind::Structure {
                implements,
                members,
            }
        } else {
            TypeDeclKind::Class {
                inherits,
                implements,
                members,
            }
        };
        Some(TypeDeclaration {
            attributes,
            modifiers,
            name,
            kind,
            location,
        })
    }

    fn parse_interface(
        &mut self,
        context: &DeclContext,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Option<TypeDeclaration> {
        let location = self.here();
        let name = self.expect_identifier("interface name");
        self.expect_terminator();
        self.skip_terminators();

        let mut inherits = Vec::new();
        while self.at_keyword(Keyword::Inherits) {
            self.advance();
            loop {
                inherits.push(self.parse_type_name());
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_terminator();
            self.skip_terminators();
        }

        let body_context = context.inside_type(&name);
        let members = self.parse_type_body(&body_context, true);
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Interface);
        Some(TypeDeclaration {
            attributes,
            modifiers,
            name,
            kind: TypeDeclKind::Interface { inherits, members },
            location,
        })
    }

    fn parse_module(
        &mut self,
        context: &DeclContext,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Option<TypeDeclaration> {
        let location = self.here();
        let name = self.expect_identifier("module name");
        self.expect_terminator();
        let body_context = context.inside_type(&name);
        let members = self.parse_type_body(&body_context, false);
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Module);
        Some(TypeDeclaration {
            attributes,
            modifiers,
            name,
            kind: TypeDeclKind::Module { members },
            location,
        })
    }

    fn parse_enum(
        &mut self,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Option<TypeDeclaration> {
        let location = self.here();
        let name = self.expect_identifier("enumeration name");
        let underlying = self.parse_optional_as_clause();
        self.expect_terminator();
        self.skip_terminators();

        let mut members = Vec::new();
        while !self.is_at_end() && !self.at_keyword(Keyword::End) {
            let member_location = self.here();
            let member_name = self.expect_identifier("enumeration member name");
            let value = if self.match_token(&TokenKind::Equals) {
                Some(self.parse_expression())
            } else {
                None
            };
            members.push(EnumMemberDeclaration {
                name: member_name,
                value,
                location: member_location,
            });
            self.expect_terminator();
            self.skip_terminators();
        }
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Enum);
        Some(TypeDeclaration {
            attributes,
            modifiers,
            name,
            kind: TypeDeclKind::Enum {
                underlying,
                members,
            },
            location,
        })
    }

    fn parse_delegate(
        &mut self,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Option<TypeDeclaration> {
        let location = self.here();
        let is_function = if self.match_keyword(Keyword::Function) {
            true
        } else {
            self.expect_keyword(Keyword::Sub);
            false
        };
        let name = self.expect_identifier("delegate name");
        let parameters = self.parse_parameter_list();
        let return_type = if is_function {
            let return_type = self.parse_optional_as_clause();
            if return_type.is_none() {
                self.error_code(
                    codes::FUNCTION_WITHOUT_RETURN_TYPE,
                    location,
                    format!("delegate function '{name}' must declare a return type"),
                );
            }
            return_type
        } else {
            None
        };
        Some(TypeDeclaration {
            attributes,
            modifiers,
            name,
            kind: TypeDeclKind::Delegate {
                parameters,
                return_type,
            },
            location,
        })
    }

    // === Members ===

    /// Parses type-body members until the closing `End`.
    fn parse_type_body(
        &mut self,
        context: &DeclContext,
        in_interface: bool,
    ) -> Vec<MemberDeclaration> {
        let mut members = Vec::new();
        self.skip_terminators();
        while !self.is_at_end() && !self.at_keyword(Keyword::End) {
            members.extend(self.parse_member(context, in_interface));
            self.skip_terminators();
        }
        members
    }

    /// Parses one member declaration. A field line can declare several
    /// variables, so this returns a vector.
    fn parse_member(&mut self, context: &DeclContext, in_interface: bool) -> Vec<MemberDeclaration> {
        let attributes = self.parse_attributes();
        let modifiers = self.parse_modifiers();
        let location = self.here();

        match self.current_kind() {
            TokenKind::Keyword(Keyword::Sub | Keyword::Function) => {
                let is_function = self.at_keyword(Keyword::Function);
                self.advance();
                self.parse_method_member(
                    attributes,
                    modifiers,
                    is_function,
                    in_interface,
                    location,
                )
            }
            TokenKind::Keyword(Keyword::Property) => {
                self.advance();
                self.check_modifiers(modifiers, allowed::PROPERTY, "property");
                self.parse_property_member(attributes, modifiers, in_interface, location)
            }
            TokenKind::Keyword(Keyword::Event) => {
                self.advance();
                self.check_modifiers(modifiers, allowed::EVENT, "event");
                let name = self.expect_identifier("event name");
                let parameters = self.parse_parameter_list();
                self.expect_terminator();
                vec![MemberDeclaration {
                    attributes,
                    modifiers,
                    kind: MemberKind::Event { name, parameters },
                    location,
                }]
            }
            TokenKind::Keyword(Keyword::Const) => {
                self.advance();
                self.check_modifiers(modifiers, allowed::CONSTANT, "constant");
                let name = self.expect_identifier("constant name");
                let type_name = self.parse_optional_as_clause();
                self.expect_token(&TokenKind::Equals);
                let initializer = self.parse_expression();
                self.expect_terminator();
                vec![MemberDeclaration {
                    attributes,
                    modifiers,
                    kind: MemberKind::Constant {
                        name,
                        type_name,
                        initializer,
                    },
                    location,
                }]
            }
            TokenKind::Keyword(Keyword::Dim) | TokenKind::Identifier(_) => {
                self.match_keyword(Keyword::Dim);
                self.check_modifiers(modifiers, allowed::FIELD, "field");
                self.parse_field_members(attributes, modifiers)
            }
            other => {
                let container = context.container.as_deref().unwrap_or("?");
                self.error(format!(
                    "member declaration expected in '{container}', found '{other}'"
                ));
                self.synchronize();
                Vec::new()
            }
        }
    }

    fn parse_field_members(
        &mut self,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
    ) -> Vec<MemberDeclaration> {
        let mut members = Vec::new();
        loop {
            let location = self.here();
            let name = self.expect_identifier("field name");
            let type_name = self.parse_optional_as_clause();
            let initializer = if self.match_token(&TokenKind::Equals) {
                Some(self.parse_expression())
            } else {
                None
            };
            members.push(MemberDeclaration {
                attributes: attributes.clone(),
                modifiers,
                kind: MemberKind::Field {
                    name,
                    type_name,
                    initializer,
                },
                location,
            });
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_terminator();
        members
    }

    fn parse_method_member(
        &mut self,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
        is_function: bool,
        in_interface: bool,
        location: Location,
    ) -> Vec<MemberDeclaration> {
        // `Sub New` is a constructor; everything else is a method.
        let is_constructor = !is_function && self.at_keyword(Keyword::New);
        let name = if is_constructor {
            self.advance();
            EcoString::from("New")
        } else {
            self.expect_identifier("method name")
        };

        if is_constructor {
            self.check_modifiers(modifiers, allowed::CONSTRUCTOR, "constructor");
        } else {
            self.check_modifiers(modifiers, allowed::METHOD, "method");
        }

        let parameters = self.parse_parameter_list();
        let return_type = if is_function {
            let return_type = self.parse_optional_as_clause();
            if return_type.is_none() {
                self.error_code(
                    codes::FUNCTION_WITHOUT_RETURN_TYPE,
                    location,
                    format!("function '{name}' must declare a return type"),
                );
            }
            return_type
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.match_keyword(Keyword::Implements) {
            loop {
                implements.push(self.parse_implements_reference());
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }

        // Interface methods and MustOverride methods are bodiless.
        let body = if in_interface || modifiers.contains(Modifiers::MUST_OVERRIDE) {
            None
        } else {
            self.expect_terminator();
            let body = self.parse_block();
            self.expect_keyword(Keyword::End);
            self.expect_keyword(if is_function {
                Keyword::Function
            } else {
                Keyword::Sub
            });
            Some(body)
        };

        let method = MethodDeclaration {
            name,
            parameters,
            return_type,
            is_function,
            implements,
            body,
            location,
        };
        let kind = if is_constructor {
            MemberKind::Constructor(method)
        } else {
            MemberKind::Method(method)
        };
        vec![MemberDeclaration {
            attributes,
            modifiers,
            kind,
            location,
        }]
    }

    /// Parses `Interface.Method` in an `Implements` clause.
    fn parse_implements_reference(&mut self) -> (TypeName, EcoString) {
        let location = self.here();
        let mut name = self.parse_qualified_name();
        if name.0.len() < 2 {
            self.error_at(location, "'Implements' requires an interface-qualified method name");
            let method = name.last().clone();
            return (TypeName::named(name, location), method);
        }
        let method = name.0.pop().expect("checked length above");
        (TypeName::named(name, location), method)
    }

    fn parse_property_member(
        &mut self,
        attributes: Vec<AttributeUsage>,
        modifiers: Modifiers,
        in_interface: bool,
        location: Location,
    ) -> Vec<MemberDeclaration> {
        let name = self.expect_identifier("property name");
        let parameters = if self.current_kind() == &TokenKind::LeftParen {
            self.parse_parameter_list()
        } else {
            Vec::new()
        };
        let type_name = self.parse_optional_as_clause();

        let (getter, setter) = if in_interface || modifiers.contains(Modifiers::MUST_OVERRIDE) {
            (None, None)
        } else {
            self.expect_terminator();
            self.parse_property_accessors()
        };

        vec![MemberDeclaration {
            attributes,
            modifiers,
            kind: MemberKind::Property(PropertyDeclaration {
                name,
                type_name,
                parameters,
                getter,
                setter,
            }),
            location,
        }]
    }

    #[expect(clippy::type_complexity, reason = "accessor pair mirrors the AST field")]
    fn parse_property_accessors(
        &mut self,
    ) -> (
        Option<Vec<crate::ast::Statement>>,
        Option<(EcoString, Vec<crate::ast::Statement>)>,
    ) {
        let mut getter = None;
        let mut setter = None;
        self.skip_terminators();
        while !self.is_at_end() && !self.at_keyword(Keyword::End) {
            if self.match_keyword(Keyword::Get) {
                self.expect_terminator();
                let body = self.parse_block();
                self.expect_keyword(Keyword::End);
                self.expect_keyword(Keyword::Get);
                if getter.replace(body).is_some() {
                    self.error("'Get' can appear only once in a property");
                }
            } else if self.match_keyword(Keyword::Set) {
                // `Set(value As T)` names the incoming value.
                let value_name = if self.match_token(&TokenKind::LeftParen) {
                    let value_name = self.expect_identifier("value parameter name");
                    let _ = self.parse_optional_as_clause();
                    self.expect_token(&TokenKind::RightParen);
                    value_name
                } else {
                    EcoString::from("Value")
                };
                self.expect_terminator();
                let body = self.parse_block();
                self.expect_keyword(Keyword::End);
                self.expect_keyword(Keyword::Set);
                if setter.replace((value_name, body)).is_some() {
                    self.error("'Set' can appear only once in a property");
                }
            } else {
                self.error(format!(
                    "'Get' or 'Set' expected, found '{}'",
                    self.current_kind()
                ));
                self.synchronize();
            }
            self.skip_terminators();
        }
        self.expect_keyword(Keyword::End);
        self.expect_keyword(Keyword::Property);
        (getter, setter)
    }

    // === Parameters ===

    /// Parses a parenthesized parameter list. An absent list is treated
    /// as empty (interface subs declared without parentheses).
    pub(super) fn parse_parameter_list(&mut self) -> Vec<ParameterDeclaration> {
        let mut parameters = Vec::new();
        if !self.match_token(&TokenKind::LeftParen) {
            return parameters;
        }
        if self.match_token(&TokenKind::RightParen) {
            return parameters;
        }
        loop {
            parameters.push(self.parse_parameter());
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }
        self.expect_token(&TokenKind::RightParen);
        parameters
    }

    fn parse_parameter(&mut self) -> ParameterDeclaration {
        let mut modifiers = Modifiers::NONE;
        loop {
            let flag = match self.current_kind() {
                TokenKind::Keyword(Keyword::ByVal) => Modifiers::BY_VAL,
                TokenKind::Keyword(Keyword::ByRef) => Modifiers::BY_REF,
                TokenKind::Keyword(Keyword::Optional) => Modifiers::OPTIONAL,
                TokenKind::Keyword(Keyword::ParamArray) => Modifiers::PARAM_ARRAY,
                _ => break,
            };
            let location = self.here();
            self.advance();
            if !modifiers.insert(flag) {
                self.error_code(
                    codes::DUPLICATE_MODIFIER,
                    location,
                    format!("modifier '{}' is repeated", flag.flag_name()),
                );
            }
        }
        if modifiers.contains(Modifiers::BY_VAL) && modifiers.contains(Modifiers::BY_REF) {
            self.error("a parameter cannot be both 'ByVal' and 'ByRef'");
        }
        self.check_modifiers(modifiers, allowed::PARAMETER, "parameter");

        let location = self.here();
        let name = self.expect_identifier("parameter name");
        let type_name = self.parse_optional_as_clause();
        let default = if self.match_token(&TokenKind::Equals) {
            if !modifiers.contains(Modifiers::OPTIONAL) {
                self.error_at(location, "only 'Optional' parameters can have a default value");
            }
            Some(self.parse_expression())
        } else {
            if modifiers.contains(Modifiers::OPTIONAL) {
                self.error_at(location, "'Optional' parameters require a default value");
            }
            None
        };
        ParameterDeclaration {
            modifiers,
            name,
            type_name,
            default,
            location,
        }
    }

    // === Modifiers and attributes ===

    /// Parses a (possibly empty) run of declaration modifiers, checking
    /// for repeats and conflicting access levels.
    fn parse_modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::NONE;
        loop {
            let flag = match self.current_kind() {
                TokenKind::Keyword(Keyword::Public) => Modifiers::PUBLIC,
                TokenKind::Keyword(Keyword::Private) => Modifiers::PRIVATE,
                TokenKind::Keyword(Keyword::Protected) => Modifiers::PROTECTED,
                TokenKind::Keyword(Keyword::Friend) => Modifiers::FRIEND,
                TokenKind::Keyword(Keyword::Shared) => Modifiers::SHARED,
                TokenKind::Keyword(Keyword::Shadows) => Modifiers::SHADOWS,
                TokenKind::Keyword(Keyword::Overridable) => Modifiers::OVERRIDABLE,
                TokenKind::Keyword(Keyword::Overrides) => Modifiers::OVERRIDES,
                TokenKind::Keyword(Keyword::MustOverride) => Modifiers::MUST_OVERRIDE,
                TokenKind::Keyword(Keyword::NotOverridable) => Modifiers::NOT_OVERRIDABLE,
                TokenKind::Keyword(Keyword::MustInherit) => Modifiers::MUST_INHERIT,
                TokenKind::Keyword(Keyword::NotInheritable) => Modifiers::NOT_INHERITABLE,
                TokenKind::Keyword(Keyword::ReadOnly) => Modifiers::READ_ONLY,
                TokenKind::Keyword(Keyword::WriteOnly) => Modifiers::WRITE_ONLY,
                _ => break,
            };
            let location = self.here();
            self.advance();
            if !modifiers.insert(flag) {
                self.error_code(
                    codes::DUPLICATE_MODIFIER,
                    location,
                    format!("modifier '{}' is repeated", flag.flag_name()),
                );
            } else if flag.intersects(Modifiers::ACCESS_MASK)
                && modifiers.difference(flag).intersects(Modifiers::ACCESS_MASK)
            {
                self.error_code(
                    codes::MULTIPLE_ACCESS_MODIFIERS,
                    location,
                    "only one access modifier is allowed",
                );
            }
        }
        modifiers
    }

    /// Reports every declared modifier outside the construct's
    /// allow-list.
    fn check_modifiers(&mut self, declared: Modifiers, allowed: Modifiers, construct: &str) {
        let invalid = declared.difference(allowed);
        let location = self.here();
        for flag in invalid.iter() {
            self.error_code(
                codes::INVALID_MODIFIER,
                location,
                format!("modifier '{}' is not valid on a {construct}", flag.flag_name()),
            );
        }
    }

    /// Parses a (possibly empty) run of `<...>` attribute lists.
    fn parse_attributes(&mut self) -> Vec<AttributeUsage> {
        let mut attributes = Vec::new();
        while self.current_kind() == &TokenKind::Less {
            self.advance();
            loop {
                let location = self.here();
                let name = self.parse_qualified_name();
                let (positional, named) = if self.current_kind() == &TokenKind::LeftParen {
                    let arguments = self.parse_argument_list();
                    let mut positional = Vec::new();
                    let mut named = Vec::new();
                    for argument in arguments {
                        match argument.name {
                            Some(field) => named.push((field, argument.value)),
                            None => positional.push(argument.value),
                        }
                    }
                    (positional, named)
                } else {
                    (Vec::new(), Vec::new())
                };
                attributes.push(AttributeUsage {
                    name,
                    positional,
                    named,
                    location,
                });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect_token(&TokenKind::Greater);
            // The attributed declaration may sit on the next line.
            self.skip_terminators();
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NamespaceMember, TypeDeclKind};
    use crate::diagnostics::Diagnostics;
    use crate::source_analysis::parse_source_unit;

    fn parse(source: &str) -> (SourceUnit, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let unit = parse_source_unit(source, 1, &mut diagnostics);
        (unit, diagnostics)
    }

    fn parse_clean(source: &str) -> SourceUnit {
        let (unit, diagnostics) = parse(source);
        assert!(
            !diagnostics.has_errors(),
            "unexpected diagnostics: {:?}",
            diagnostics.reported()
        );
        unit
    }

    fn only_type(unit: &SourceUnit) -> &TypeDeclaration {
        match &unit.members[0] {
            NamespaceMember::Type(decl) => decl,
            NamespaceMember::Namespace(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn imports_with_and_without_alias() {
        let unit = parse_clean("Imports Audio.Effects\nImports FX = Audio.Effects");
        assert_eq!(unit.imports.len(), 2);
        assert!(unit.imports[0].alias.is_none());
        assert_eq!(unit.imports[1].alias.as_deref(), Some("FX"));
        assert_eq!(unit.imports[1].target.dotted(), "Audio.Effects");
    }

    #[test]
    fn nested_namespaces() {
        let unit = parse_clean(
            "Namespace Audio\nNamespace Effects\nClass Reverb\nEnd Class\nEnd Namespace\nEnd Namespace",
        );
        let NamespaceMember::Namespace(outer) = &unit.members[0] else {
            panic!("expected namespace");
        };
        assert_eq!(outer.name.dotted(), "Audio");
        let NamespaceMember::Namespace(inner) = &outer.members[0] else {
            panic!("expected nested namespace");
        };
        assert_eq!(inner.name.dotted(), "Effects");
        assert!(matches!(inner.members[0], NamespaceMember::Type(_)));
    }

    #[test]
    fn class_with_inherits_and_implements() {
        let unit = parse_clean(
            "Class Reverb\nInherits Effect\nImplements IProcessor, IConfigurable\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class {
            inherits,
            implements,
            ..
        } = &decl.kind
        else {
            panic!("expected class");
        };
        assert!(inherits.is_some());
        assert_eq!(implements.len(), 2);
    }

    #[test]
    fn structure_cannot_inherit() {
        let (_, diagnostics) = parse("Structure Sample\nInherits Effect\nEnd Structure");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn fields_with_modifiers_and_multiple_declarators() {
        let unit = parse_clean(
            "Class Mixer\nPrivate gain As Double = 1.0, pan As Double\nShared Dim count As Integer\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        assert_eq!(members.len(), 3);
        assert!(members[0].modifiers.is_private());
        assert!(members[2].modifiers.is_shared());
    }

    #[test]
    fn methods_constructors_and_bodies() {
        let unit = parse_clean(
            "Class Wallet\nSub New(start As Integer)\nbalance = start\nEnd Sub\nFunction Total() As Integer\nReturn balance\nEnd Function\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        assert!(matches!(members[0].kind, MemberKind::Constructor(_)));
        let MemberKind::Method(method) = &members[1].kind else {
            panic!("expected method");
        };
        assert!(method.is_function);
        assert!(method.return_type.is_some());
        assert_eq!(method.body.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn function_without_return_type_reports() {
        let (_, diagnostics) = parse("Class C\nFunction Broken()\nEnd Function\nEnd Class");
        assert!(diagnostics.has_code(codes::FUNCTION_WITHOUT_RETURN_TYPE));
    }

    #[test]
    fn interface_members_have_no_bodies() {
        let unit = parse_clean(
            "Interface IProcessor\nSub Process(buffer As Double)\nFunction Name() As String\nEnd Interface",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Interface { members, .. } = &decl.kind else {
            panic!("expected interface");
        };
        for member in members {
            let (MemberKind::Method(m) | MemberKind::Constructor(m)) = &member.kind else {
                continue;
            };
            assert!(m.body.is_none());
        }
    }

    #[test]
    fn mustoverride_method_is_bodiless() {
        let unit = parse_clean(
            "MustInherit Class Effect\nMustOverride Sub Process(sample As Double)\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        let MemberKind::Method(method) = &members[0].kind else {
            panic!("expected method");
        };
        assert!(method.body.is_none());
    }

    #[test]
    fn method_implements_clause() {
        let unit = parse_clean(
            "Class Reverb\nSub DoProcess(sample As Double) Implements IProcessor.Process\nEnd Sub\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        let MemberKind::Method(method) = &members[0].kind else {
            panic!("expected method");
        };
        assert_eq!(method.implements.len(), 1);
        assert_eq!(method.implements[0].0.describe(), "IProcessor");
        assert_eq!(method.implements[0].1, "Process");
    }

    #[test]
    fn property_with_get_and_set() {
        let unit = parse_clean(
            "Class Mixer\nProperty Gain() As Double\nGet\nReturn level\nEnd Get\nSet(value As Double)\nlevel = value\nEnd Set\nEnd Property\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        let MemberKind::Property(property) = &members[0].kind else {
            panic!("expected property");
        };
        assert!(property.getter.is_some());
        assert_eq!(property.setter.as_ref().unwrap().0, "value");
    }

    #[test]
    fn enum_with_underlying_type_and_values() {
        let unit = parse_clean("Enum Channel As Byte\nLeft\nRight\nBoth = 10\nEnd Enum");
        let decl = only_type(&unit);
        let TypeDeclKind::Enum {
            underlying,
            members,
        } = &decl.kind
        else {
            panic!("expected enum");
        };
        assert!(underlying.is_some());
        assert_eq!(members.len(), 3);
        assert!(members[0].value.is_none());
        assert!(members[2].value.is_some());
    }

    #[test]
    fn delegate_declarations() {
        let unit = parse_clean("Delegate Function Comparer(a As Integer, b As Integer) As Integer");
        let decl = only_type(&unit);
        let TypeDeclKind::Delegate {
            parameters,
            return_type,
        } = &decl.kind
        else {
            panic!("expected delegate");
        };
        assert_eq!(parameters.len(), 2);
        assert!(return_type.is_some());
    }

    #[test]
    fn parameter_modifiers_and_defaults() {
        let unit = parse_clean(
            "Class C\nSub Configure(ByRef target As Integer, Optional retries As Integer = 3, ParamArray rest As Integer())\nEnd Sub\nEnd Class",
        );
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        let MemberKind::Method(method) = &members[0].kind else {
            panic!("expected method");
        };
        assert!(method.parameters[0].modifiers.contains(Modifiers::BY_REF));
        assert!(method.parameters[1].modifiers.contains(Modifiers::OPTIONAL));
        assert!(method.parameters[1].default.is_some());
        assert!(
            method.parameters[2]
                .modifiers
                .contains(Modifiers::PARAM_ARRAY)
        );
    }

    #[test]
    fn optional_without_default_reports() {
        let (_, diagnostics) =
            parse("Class C\nSub M(Optional x As Integer)\nEnd Sub\nEnd Class");
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn invalid_modifier_on_class_reports() {
        let (_, diagnostics) = parse("Overridable Class C\nEnd Class");
        assert!(diagnostics.has_code(codes::INVALID_MODIFIER));
    }

    #[test]
    fn duplicate_and_conflicting_modifiers_report() {
        let (_, diagnostics) = parse("Public Public Class C\nEnd Class");
        assert!(diagnostics.has_code(codes::DUPLICATE_MODIFIER));
        let (_, diagnostics) = parse("Public Private Class C\nEnd Class");
        assert!(diagnostics.has_code(codes::MULTIPLE_ACCESS_MODIFIERS));
    }

    #[test]
    fn attributes_on_types_and_members() {
        let unit = parse_clean(
            "<Streamable(1, channel:=2)>\nClass Sample\n<Obsolete>\nSub Old()\nEnd Sub\nEnd Class",
        );
        let decl = only_type(&unit);
        assert_eq!(decl.attributes.len(), 1);
        assert_eq!(decl.attributes[0].positional.len(), 1);
        assert_eq!(decl.attributes[0].named.len(), 1);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        assert_eq!(members[0].attributes.len(), 1);
    }

    #[test]
    fn escaped_identifier_declares_keyword_name() {
        let unit = parse_clean("Class [End]\nEnd Class");
        assert_eq!(only_type(&unit).name, "End");
    }

    #[test]
    fn garbage_member_recovers() {
        let (unit, diagnostics) = parse("Class C\n???\nSub Ok()\nEnd Sub\nEnd Class");
        assert!(diagnostics.has_errors());
        let decl = only_type(&unit);
        let TypeDeclKind::Class { members, .. } = &decl.kind else {
            panic!("expected class");
        };
        assert!(
            members
                .iter()
                .any(|m| matches!(&m.kind, MemberKind::Method(method) if method.name == "Ok"))
        );
    }
}
