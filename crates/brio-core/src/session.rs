// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The compilation session.
//!
//! A [`CompilationSession`] owns everything one compilation shares:
//! the diagnostics sink, the type registry, the source map, the import
//! tables, and the constant slots. It is an explicitly constructed
//! value — two sessions in one process are fully independent, which is
//! also what makes the test suite cheap to isolate.
//!
//! [`CompilationSession::compile`] runs the passes in their fixed
//! order:
//!
//! 1. **declare** — register every type by qualified name
//! 2. **define** — resolve bases, interfaces, and enum underlying types
//! 3. **members** — build member descriptors: signatures, fields,
//!    constants, enum values
//! 4. **resolve** — evaluate constants, validate attributes, resolve
//!    every method body with flow analysis
//! 5. **close** — check pending interface/abstract implementations and
//!    synthesize proxies
//!
//! The ordering invariant the passes maintain: a type's base and
//! interfaces are *defined* before the type's own member-definition
//! pass runs. Within a pass, a failure poisons only its own
//! declaration; siblings keep accumulating diagnostics — this is a
//! batch compiler, and it reports everything it can ascertain.

use ecow::EcoString;

use crate::ast::{
    EnumMemberDeclaration, Expression, MemberDeclaration, MemberKind as AstMemberKind,
    MethodDeclaration, Modifiers, NamespaceMember, ParameterDeclaration, SourceUnit, Statement,
    TypeDeclKind, TypeDeclaration,
};
use crate::diagnostics::{Diagnostics, codes};
use crate::emit::{Emitter, ResolvedMember, ResolvedProgram, ResolvedType};
use crate::semantic_analysis::resolver::{ConstantSlot, MethodContext};
use crate::semantic_analysis::{
    ConstantTable, ConstantValue, DeclareResult, ImportTable, MemberDescriptor, MemberId,
    MemberKind, MethodSignature, ParameterSig, PendingImplementations, PrimitiveKind, Resolver,
    TypeDescriptor, TypeId, TypeKind, TypeRegistry, TypeState,
};
use crate::source_analysis::{Location, SourceMap, parse_source_unit};

/// Bit masks for the declaration kinds an attribute may target.
pub mod attribute_targets {
    pub const CLASS: u32 = 1;
    pub const STRUCTURE: u32 = 1 << 1;
    pub const INTERFACE: u32 = 1 << 2;
    pub const MODULE: u32 = 1 << 3;
    pub const ENUM: u32 = 1 << 4;
    pub const DELEGATE: u32 = 1 << 5;
    pub const METHOD: u32 = 1 << 6;
    pub const CONSTRUCTOR: u32 = 1 << 7;
    pub const FIELD: u32 = 1 << 8;
    pub const PROPERTY: u32 = 1 << 9;
    pub const EVENT: u32 = 1 << 10;
    pub const ALL: u32 = (1 << 11) - 1;
}

/// The finite set of attributable declaration kinds. Each application
/// site carries exactly one of these, so validity is a mask test — no
/// open-ended fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeTargetKind {
    Class,
    Structure,
    Interface,
    Module,
    Enum,
    Delegate,
    Method,
    Constructor,
    Field,
    Property,
    Event,
}

impl AttributeTargetKind {
    const fn mask(self) -> u32 {
        match self {
            Self::Class => attribute_targets::CLASS,
            Self::Structure => attribute_targets::STRUCTURE,
            Self::Interface => attribute_targets::INTERFACE,
            Self::Module => attribute_targets::MODULE,
            Self::Enum => attribute_targets::ENUM,
            Self::Delegate => attribute_targets::DELEGATE,
            Self::Method => attribute_targets::METHOD,
            Self::Constructor => attribute_targets::CONSTRUCTOR,
            Self::Field => attribute_targets::FIELD,
            Self::Property => attribute_targets::PROPERTY,
            Self::Event => attribute_targets::EVENT,
        }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Class => "a class",
            Self::Structure => "a structure",
            Self::Interface => "an interface",
            Self::Module => "a module",
            Self::Enum => "an enumeration",
            Self::Delegate => "a delegate",
            Self::Method => "a method",
            Self::Constructor => "a constructor",
            Self::Field => "a field",
            Self::Property => "a property",
            Self::Event => "an event",
        }
    }
}

/// Session-level configuration.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Count warnings as errors.
    pub warnings_as_errors: bool,
    /// Abort on the first error instead of accumulating.
    pub fatal_errors: bool,
    /// Warn when a `Function` can fall off its end (the language lets
    /// it return the default value silently; this makes it audible).
    pub warn_missing_return: bool,
    /// Warning codes to drop.
    pub suppressed_warnings: Vec<u16>,
    /// Test-harness hook: latch when this code is reported.
    pub expected_code: Option<u16>,
}

/// One compilation: sources in, diagnostics and a resolved program out.
#[derive(Debug)]
pub struct CompilationSession {
    /// Session configuration.
    pub options: CompilerOptions,
    /// The diagnostics sink.
    pub diagnostics: Diagnostics,
    /// The type registry, bootstrapped with the builtins.
    pub registry: TypeRegistry,
    /// Interned source file names.
    pub source_map: SourceMap,
    /// The compilation's `Imports` tables.
    pub imports: ImportTable,
    constants: ConstantTable,
    units: Vec<SourceUnit>,
}

/// A registered type with its declaration, carried between passes.
struct TypeWork {
    id: TypeId,
    namespace: EcoString,
    decl: TypeDeclaration,
    methods: Vec<MethodWork>,
    properties: Vec<PropertyWork>,
    field_inits: Vec<(MemberId, Expression)>,
}

struct MethodWork {
    member: MemberId,
    body: Option<Vec<Statement>>,
    implements: Vec<(TypeId, EcoString)>,
    modifiers: Modifiers,
    is_function: bool,
    is_constructor: bool,
}

struct PropertyWork {
    member: MemberId,
    modifiers: Modifiers,
    getter: Option<Vec<Statement>>,
    setter: Option<(EcoString, Vec<Statement>)>,
}

impl CompilationSession {
    /// Creates a session with the given options.
    #[must_use]
    pub fn new(options: CompilerOptions) -> Self {
        let mut diagnostics = Diagnostics::new();
        diagnostics.set_warnings_as_errors(options.warnings_as_errors);
        diagnostics.set_fatal_errors(options.fatal_errors);
        for &code in &options.suppressed_warnings {
            diagnostics.suppress(code);
        }
        if let Some(code) = options.expected_code {
            diagnostics.expect_code(code);
        }
        Self {
            options,
            diagnostics,
            registry: TypeRegistry::new(),
            source_map: SourceMap::new(),
            imports: ImportTable::new(),
            constants: ConstantTable::new(),
            units: Vec::new(),
        }
    }

    /// Parses one source file into the session.
    pub fn add_source(&mut self, name: impl Into<EcoString>, text: &str) {
        let name = name.into();
        let file = self.source_map.add_file(name.clone());
        tracing::debug!(%name, file, "parsing source file");
        let unit = parse_source_unit(text, file, &mut self.diagnostics);
        self.units.push(unit);
    }

    /// Runs every pass and returns the resolved program.
    pub fn compile(&mut self) -> ResolvedProgram {
        self.collect_imports();
        tracing::debug!("pass: declare types");
        let mut work = self.declare_types();
        if self.should_stop() {
            return self.finish_program(Vec::new());
        }
        tracing::debug!("pass: define bases and interfaces");
        self.define_types(&mut work);
        if self.should_stop() {
            return self.finish_program(Vec::new());
        }
        tracing::debug!("pass: define members");
        self.define_members(&mut work);
        if self.should_stop() {
            return self.finish_program(Vec::new());
        }
        tracing::debug!("pass: constants and attributes");
        self.resolve_all_constants();
        self.check_attributes(&work);
        tracing::debug!("pass: method bodies and type closure");
        let types = self.resolve_bodies_and_close(work);
        self.report_unused_imports();
        self.finish_program(types)
    }

    /// Compiles and hands the program to an emitter. Failed
    /// declarations have already been excluded, so the emitter sees
    /// fully resolved nodes only.
    pub fn emit(&mut self, emitter: &mut dyn Emitter) -> ResolvedProgram {
        let program = self.compile();
        if program.success {
            for ty in &program.types {
                emitter.emit_type(&self.registry, ty);
            }
            emitter.finish(&self.registry);
        }
        program
    }

    fn should_stop(&self) -> bool {
        self.diagnostics.is_fatal() || self.diagnostics.expected_code_seen()
    }

    fn finish_program(&self, types: Vec<ResolvedType>) -> ResolvedProgram {
        ResolvedProgram {
            types,
            success: !self.diagnostics.has_errors(),
        }
    }

    // === Pass 0: imports ===

    fn collect_imports(&mut self) {
        for unit in &self.units {
            for import in &unit.imports {
                match &import.alias {
                    Some(alias) => {
                        if !self.imports.add_alias(alias, &import.target, import.location) {
                            self.diagnostics.error(
                                codes::DUPLICATE_IMPORT_ALIAS,
                                import.location,
                                format!("import alias '{alias}' is already defined"),
                            );
                        }
                    }
                    None => self.imports.add_namespace(&import.target, import.location),
                }
            }
        }
    }

    // === Pass 1: declare ===

    fn declare_types(&mut self) -> Vec<TypeWork> {
        let mut declarations = Vec::new();
        for unit in &self.units {
            collect_declarations(&unit.members, &EcoString::new(), &mut declarations);
        }

        let mut work = Vec::new();
        for (namespace, decl) in declarations {
            let full_name = if namespace.is_empty() {
                decl.name.clone()
            } else {
                EcoString::from(format!("{namespace}.{}", decl.name))
            };
            let kind = match &decl.kind {
                TypeDeclKind::Class { .. } => TypeKind::Class,
                TypeDeclKind::Structure { .. } => TypeKind::Structure,
                TypeDeclKind::Interface { .. } => TypeKind::Interface,
                TypeDeclKind::Module { .. } => TypeKind::Module,
                // The underlying type is validated during define.
                TypeDeclKind::Enum { .. } => TypeKind::Enum {
                    underlying: PrimitiveKind::Integer,
                },
                TypeDeclKind::Delegate { .. } => TypeKind::Delegate,
            };
            let base = match kind {
                TypeKind::Class | TypeKind::Module => Some(self.registry.object()),
                TypeKind::Structure => Some(self.registry.value_root()),
                TypeKind::Enum { .. } => Some(self.registry.enum_root()),
                TypeKind::Delegate => Some(self.registry.delegate_root()),
                _ => None,
            };
            let descriptor = TypeDescriptor {
                full_name,
                simple_name: decl.name.clone(),
                kind,
                base,
                interfaces: Vec::new(),
                members: Vec::new(),
                modifiers: decl.modifiers,
                state: TypeState::Declared,
            };
            match self.registry.register(&namespace, descriptor) {
                Ok(id) => work.push(TypeWork {
                    id,
                    namespace,
                    decl,
                    methods: Vec::new(),
                    properties: Vec::new(),
                    field_inits: Vec::new(),
                }),
                Err(_) => {
                    self.diagnostics.error(
                        codes::NAME_EXISTS,
                        decl.location,
                        format!("type '{}' is already declared", decl.name),
                    );
                }
            }
        }
        work
    }

    // === Pass 2: define bases and interfaces ===

    fn define_types(&mut self, work: &mut [TypeWork]) {
        for item in work.iter_mut() {
            self.registry.descriptor_mut(item.id).state = TypeState::Defining;
            let mut resolver = Resolver::new(
                &mut self.registry,
                &mut self.diagnostics,
                &mut self.imports,
                &mut self.constants,
                item.namespace.clone(),
                Some(item.id),
            );

            match &item.decl.kind {
                TypeDeclKind::Class {
                    inherits,
                    implements,
                    ..
                } => {
                    if let Some(base_name) = inherits {
                        if let Some(base) = resolver.resolve_type(base_name, false) {
                            let descriptor = resolver.registry.descriptor(base);
                            if descriptor.is_interface() || descriptor.is_value_type() {
                                resolver.diagnostics.error(
                                    codes::NOT_A_TYPE,
                                    base_name.location,
                                    format!(
                                        "'{}' cannot be used as a base class",
                                        descriptor.full_name
                                    ),
                                );
                            } else if resolver.registry.is_or_inherits(base, item.id) {
                                resolver.diagnostics.error(
                                    codes::NOT_A_TYPE,
                                    base_name.location,
                                    "inheritance relationship would be circular",
                                );
                            } else {
                                resolver.registry.descriptor_mut(item.id).base = Some(base);
                            }
                        }
                    }
                    let resolved = resolve_interface_list(&mut resolver, implements);
                    resolver.registry.descriptor_mut(item.id).interfaces = resolved;
                }
                TypeDeclKind::Structure { implements, .. } => {
                    let resolved = resolve_interface_list(&mut resolver, implements);
                    resolver.registry.descriptor_mut(item.id).interfaces = resolved;
                }
                TypeDeclKind::Interface { inherits, .. } => {
                    let resolved = resolve_interface_list(&mut resolver, inherits);
                    resolver.registry.descriptor_mut(item.id).interfaces = resolved;
                }
                TypeDeclKind::Enum { underlying, .. } => {
                    if let Some(type_name) = underlying {
                        let resolved = resolver.resolve_type(type_name, false);
                        let primitive = resolved.and_then(|ty| {
                            resolver.registry.descriptor(ty).primitive_kind()
                        });
                        match primitive {
                            Some(primitive) if primitive.is_integral() => {
                                resolver.registry.descriptor_mut(item.id).kind =
                                    TypeKind::Enum {
                                        underlying: primitive,
                                    };
                            }
                            Some(_) | None if resolved.is_some() => {
                                resolver.diagnostics.error(
                                    codes::ENUM_UNDERLYING_NOT_INTEGRAL,
                                    type_name.location,
                                    "an enumeration's underlying type must be one of the \
                                     integer types",
                                );
                            }
                            _ => {}
                        }
                    }
                }
                TypeDeclKind::Module { .. } | TypeDeclKind::Delegate { .. } => {}
            }
            self.registry.descriptor_mut(item.id).state = TypeState::Defined;
        }
    }

    // === Pass 3: define members ===

    fn define_members(&mut self, work: &mut [TypeWork]) {
        for item in work.iter_mut() {
            let mut resolver = Resolver::new(
                &mut self.registry,
                &mut self.diagnostics,
                &mut self.imports,
                &mut self.constants,
                item.namespace.clone(),
                Some(item.id),
            );
            define_type_members(&mut resolver, item);
        }
    }

    // === Pass 4a: constants ===

    fn resolve_all_constants(&mut self) {
        let mut resolver = Resolver::new(
            &mut self.registry,
            &mut self.diagnostics,
            &mut self.imports,
            &mut self.constants,
            EcoString::new(),
            None,
        );
        for member in resolver.constants.member_ids() {
            let _ = resolver.evaluate_constant(member);
        }
    }

    // === Pass 4b: attributes ===

    fn check_attributes(&mut self, work: &[TypeWork]) {
        // In-compilation usage metadata: an attribute class declares
        // its legal targets through a well-known `AttributeUsage`
        // marker whose first argument is a target mask.
        let mut usage_masks: Vec<(TypeId, u32)> = Vec::new();
        for item in work {
            for usage in &item.decl.attributes {
                if usage.name.last().eq_ignore_ascii_case("AttributeUsage") {
                    let mut resolver = Resolver::new(
                        &mut self.registry,
                        &mut self.diagnostics,
                        &mut self.imports,
                        &mut self.constants,
                        item.namespace.clone(),
                        Some(item.id),
                    );
                    if let Some(first) = usage.positional.first() {
                        if let Ok(value) = resolver.resolve_constant_expr(first) {
                            if let Ok(ConstantValue::Int { value, .. }) =
                                value.convert_to(PrimitiveKind::UInteger)
                            {
                                usage_masks.push((
                                    item.id,
                                    u32::try_from(value).unwrap_or(attribute_targets::ALL),
                                ));
                            }
                        }
                    }
                }
            }
        }

        for item in work {
            let target_kind = match &item.decl.kind {
                TypeDeclKind::Class { .. } => AttributeTargetKind::Class,
                TypeDeclKind::Structure { .. } => AttributeTargetKind::Structure,
                TypeDeclKind::Interface { .. } => AttributeTargetKind::Interface,
                TypeDeclKind::Module { .. } => AttributeTargetKind::Module,
                TypeDeclKind::Enum { .. } => AttributeTargetKind::Enum,
                TypeDeclKind::Delegate { .. } => AttributeTargetKind::Delegate,
            };
            self.check_attribute_list(item, &item.decl.attributes, target_kind, &usage_masks);

            let members: Vec<(Vec<crate::ast::AttributeUsage>, AttributeTargetKind)> =
                collect_member_attribute_sites(&item.decl);
            for (attributes, kind) in members {
                self.check_attribute_list(item, &attributes, kind, &usage_masks);
            }
        }
    }

    fn check_attribute_list(
        &mut self,
        item: &TypeWork,
        attributes: &[crate::ast::AttributeUsage],
        target_kind: AttributeTargetKind,
        usage_masks: &[(TypeId, u32)],
    ) {
        for usage in attributes {
            // The usage marker itself is validated structurally above.
            if usage.name.last().eq_ignore_ascii_case("AttributeUsage") {
                continue;
            }
            let mut resolver = Resolver::new(
                &mut self.registry,
                &mut self.diagnostics,
                &mut self.imports,
                &mut self.constants,
                item.namespace.clone(),
                Some(item.id),
            );

            // The attribute class, with the conventional name suffix
            // tried second.
            let attr_type = resolver
                .resolve_qualified(&usage.name, true, usage.location)
                .or_else(|| {
                    let mut suffixed = usage.name.clone();
                    let last = suffixed.0.last_mut().expect("name has segments");
                    last.push_str("Attribute");
                    resolver.resolve_qualified(&suffixed, true, usage.location)
                });
            let Some(attr_type) = attr_type else {
                resolver.diagnostics.error(
                    codes::TYPE_NOT_FOUND,
                    usage.location,
                    format!("attribute type '{}' is not defined", usage.name.dotted()),
                );
                continue;
            };

            // Positional arguments: constants or type references only.
            for argument in &usage.positional {
                if resolver.resolve_constant_expr(argument).is_err() {
                    resolver.diagnostics.error(
                        codes::ATTRIBUTE_ARGUMENT_NOT_CONSTANT,
                        argument.location,
                        "attribute arguments must be constant expressions or type references",
                    );
                }
            }

            // Named arguments bind to a writable field or property.
            for (field_name, argument) in &usage.named {
                let members = resolver.registry.members_named(attr_type, field_name);
                let writable = members.iter().any(|&id| {
                    match &resolver.registry.member(id).kind {
                        MemberKind::Field { .. } => true,
                        MemberKind::Property { writable, .. } => *writable,
                        _ => false,
                    }
                });
                if !writable {
                    resolver.diagnostics.error(
                        codes::NAME_NOT_FOUND,
                        argument.location,
                        format!(
                            "'{field_name}' is not a writable field or property of the \
                             attribute type"
                        ),
                    );
                } else if resolver.resolve_constant_expr(argument).is_err() {
                    resolver.diagnostics.error(
                        codes::ATTRIBUTE_ARGUMENT_NOT_CONSTANT,
                        argument.location,
                        "attribute arguments must be constant expressions or type references",
                    );
                }
            }

            // Target validity against the attribute's usage metadata.
            // Metadata we cannot find is an error, not a silent pass.
            let mask = usage_masks
                .iter()
                .find(|(ty, _)| *ty == attr_type)
                .map(|(_, mask)| *mask);
            match mask {
                Some(mask) => {
                    if mask & target_kind.mask() == 0 {
                        resolver.diagnostics.error(
                            codes::ATTRIBUTE_TARGET_INVALID,
                            usage.location,
                            format!(
                                "attribute '{}' cannot be applied to {}",
                                usage.name.dotted(),
                                target_kind.describe()
                            ),
                        );
                    }
                }
                None => {
                    resolver.diagnostics.error(
                        codes::ATTRIBUTE_USAGE_UNKNOWN,
                        usage.location,
                        format!(
                            "cannot verify the targets of attribute '{}': it declares no \
                             usage metadata",
                            usage.name.dotted()
                        ),
                    );
                }
            }
        }
    }

    // === Pass 5: bodies and type closure ===

    fn resolve_bodies_and_close(&mut self, work: Vec<TypeWork>) -> Vec<ResolvedType> {
        let mut resolved_types = Vec::new();
        for item in work {
            if self.should_stop() {
                break;
            }
            tracing::debug!(
                ty = %self.registry.descriptor(item.id).full_name,
                "resolving type bodies"
            );
            let mut members = Vec::new();
            let mut proxies = Vec::new();

            // Field initializers.
            for (member, initializer) in &item.field_inits {
                let MemberKind::Field { ty } = self.registry.member(*member).kind.clone() else {
                    continue;
                };
                let is_shared = self.registry.member(*member).modifiers.is_shared();
                let mut resolver = self.body_resolver(&item, MethodContext {
                    is_shared: is_shared
                        || matches!(self.registry.descriptor(item.id).kind, TypeKind::Module),
                    ..MethodContext::default()
                });
                let resolved = resolver
                    .resolve_expression(initializer)
                    .and_then(|value| resolver.expect_value(value))
                    .and_then(|value| resolver.implicit_conversion(value, ty));
                members.push(ResolvedMember {
                    member: *member,
                    body: None,
                    setter_body: None,
                    initializer: resolved.ok(),
                });
            }

            // Method and constructor bodies.
            let mut pending = PendingImplementations::gather(&self.registry, item.id);
            for method in &item.methods {
                // Clear pending entries with every own method, bodied
                // or not.
                match pending.satisfy_member(&self.registry, method.member, &method.implements) {
                    Ok(mut explicit_proxies) => proxies.append(&mut explicit_proxies),
                    Err(inconsistency) => {
                        self.diagnostics.error(
                            codes::INTERNAL_INCONSISTENCY,
                            Location::NULL,
                            inconsistency.to_string(),
                        );
                    }
                }

                let Some(body) = &method.body else {
                    members.push(ResolvedMember {
                        member: method.member,
                        body: None,
                        setter_body: None,
                        initializer: None,
                    });
                    continue;
                };
                let context = self.method_context(&item, method);
                let mut resolver = self.body_resolver(&item, context);
                prepare_structure_constructor(&mut resolver, item.id, method);
                let resolved_body = resolver.resolve_method_body(body);
                members.push(ResolvedMember {
                    member: method.member,
                    body: Some(resolved_body),
                    setter_body: None,
                    initializer: None,
                });
            }

            // Property accessors.
            for property in &item.properties {
                let MemberKind::Property { ty, .. } =
                    self.registry.member(property.member).kind.clone()
                else {
                    continue;
                };
                let is_shared = property.modifiers.is_shared()
                    || matches!(self.registry.descriptor(item.id).kind, TypeKind::Module);
                let getter = property.getter.as_ref().map(|body| {
                    let mut resolver = self.body_resolver(&item, MethodContext {
                        return_type: Some(ty),
                        is_shared,
                        is_function: true,
                        in_property: true,
                        ..MethodContext::default()
                    });
                    resolver.resolve_method_body(body)
                });
                let setter = property.setter.as_ref().map(|(value_name, body)| {
                    let mut resolver = self.body_resolver(&item, MethodContext {
                        parameters: vec![ParameterSig {
                            name: value_name.clone(),
                            ty,
                            modifiers: Modifiers::BY_VAL,
                            default: None,
                        }],
                        is_shared,
                        in_property: true,
                        ..MethodContext::default()
                    });
                    resolver.resolve_method_body(body)
                });
                members.push(ResolvedMember {
                    member: property.member,
                    body: getter,
                    setter_body: setter,
                    initializer: None,
                });
            }

            // Close the type: remaining requirements become proxies or
            // errors. Only classes and structures owe implementations.
            let closeable = matches!(
                self.registry.descriptor(item.id).kind,
                TypeKind::Class | TypeKind::Structure
            );
            if closeable {
                let mut base_proxies =
                    pending.finish(&self.registry, item.decl.location, &mut self.diagnostics);
                proxies.append(&mut base_proxies);
            }
            resolved_types.push(ResolvedType {
                ty: item.id,
                members,
                proxies,
            });
        }
        resolved_types
    }

    fn method_context(&self, item: &TypeWork, method: &MethodWork) -> MethodContext {
        let signature = self
            .registry
            .member(method.member)
            .signature()
            .cloned()
            .unwrap_or(MethodSignature {
                parameters: Vec::new(),
                return_type: None,
            });
        MethodContext {
            return_type: signature.return_type,
            parameters: signature.parameters,
            is_shared: method.modifiers.is_shared()
                || matches!(self.registry.descriptor(item.id).kind, TypeKind::Module),
            is_constructor: method.is_constructor,
            me_slot: -1,
            is_function: method.is_function,
            in_property: false,
        }
    }

    fn body_resolver<'a>(&'a mut self, item: &TypeWork, context: MethodContext) -> Resolver<'a> {
        let mut resolver = Resolver::new(
            &mut self.registry,
            &mut self.diagnostics,
            &mut self.imports,
            &mut self.constants,
            item.namespace.clone(),
            Some(item.id),
        );
        resolver.warn_missing_return = self.options.warn_missing_return;
        resolver.method = context;
        resolver
    }

    // === Final bookkeeping ===

    fn report_unused_imports(&mut self) {
        for (target, location) in self.imports.unused() {
            self.diagnostics.warning(
                codes::UNUSED_IMPORT,
                location,
                format!("imported namespace '{target}' is never used"),
            );
        }
    }
}

/// Recursively flattens namespace bodies into (namespace, declaration)
/// pairs.
fn collect_declarations(
    members: &[NamespaceMember],
    namespace: &EcoString,
    out: &mut Vec<(EcoString, TypeDeclaration)>,
) {
    for member in members {
        match member {
            NamespaceMember::Type(decl) => out.push((namespace.clone(), decl.clone())),
            NamespaceMember::Namespace(nested) => {
                let mut inner = namespace.to_string();
                for segment in &nested.name.0 {
                    if !inner.is_empty() {
                        inner.push('.');
                    }
                    inner.push_str(segment);
                }
                let inner = EcoString::from(inner);
                collect_declarations(&nested.members, &inner, out);
            }
        }
    }
}

fn resolve_interface_list(
    resolver: &mut Resolver<'_>,
    names: &[crate::ast::TypeName],
) -> Vec<TypeId> {
    let mut resolved = Vec::new();
    for name in names {
        if let Some(ty) = resolver.resolve_type(name, false) {
            if resolver.registry.descriptor(ty).is_interface() {
                resolved.push(ty);
            } else {
                let full_name = resolver.registry.descriptor(ty).full_name.clone();
                resolver.diagnostics.error(
                    codes::NOT_A_TYPE,
                    name.location,
                    format!("'{full_name}' is not an interface"),
                );
            }
        }
    }
    resolved
}

/// Builds the member descriptors for one type and queues its bodies.
fn define_type_members(resolver: &mut Resolver<'_>, item: &mut TypeWork) {
    use crate::semantic_analysis::DeclarationSpace;

    let type_id = item.id;
    let simple_name = resolver.registry.descriptor(type_id).simple_name.clone();
    let in_module = matches!(resolver.registry.descriptor(type_id).kind, TypeKind::Module);
    let mut names: DeclarationSpace<Vec<MemberId>> = DeclarationSpace::new();

    let declarations: Vec<MemberDeclaration> = match &item.decl.kind {
        TypeDeclKind::Class { members, .. }
        | TypeDeclKind::Structure { members, .. }
        | TypeDeclKind::Interface { members, .. }
        | TypeDeclKind::Module { members } => members.clone(),
        TypeDeclKind::Enum { members, .. } => {
            define_enum_members(resolver, item.id, members);
            return;
        }
        TypeDeclKind::Delegate {
            parameters,
            return_type,
        } => {
            let signature = resolve_signature(resolver, parameters, return_type.as_ref());
            resolver.registry.add_member(MemberDescriptor {
                name: "Invoke".into(),
                declaring_type: type_id,
                modifiers: Modifiers::PUBLIC,
                kind: MemberKind::Method { signature },
            });
            return;
        }
    };

    for declaration in declarations {
        let mut modifiers = declaration.modifiers;
        if in_module {
            modifiers = modifiers.union(Modifiers::SHARED);
        }
        let member_name = declaration.kind.name().clone();
        let is_constructor = matches!(declaration.kind, AstMemberKind::Constructor(_));

        // A member may not take its enclosing type's name.
        if !is_constructor && member_name.eq_ignore_ascii_case(&simple_name) {
            resolver.diagnostics.error(
                codes::CLASHES_WITH_ENCLOSING_TYPE,
                declaration.location,
                format!("member '{member_name}' has the same name as its enclosing type"),
            );
            continue;
        }

        match declaration.kind {
            AstMemberKind::Field {
                name,
                type_name,
                initializer,
            } => {
                let ty = match &type_name {
                    Some(type_name) => resolver.resolve_type(type_name, false),
                    None => Some(resolver.registry.object()),
                };
                let Some(ty) = ty else { continue };
                let member = resolver.registry.add_member(MemberDescriptor {
                    name: name.clone(),
                    declaring_type: type_id,
                    modifiers,
                    kind: MemberKind::Field { ty },
                });
                declare_single(resolver, &mut names, &name, member, declaration.location);
                if let Some(initializer) = initializer {
                    item.field_inits.push((member, initializer));
                }
            }

            AstMemberKind::Constant {
                name,
                type_name,
                initializer,
            } => {
                let declared = type_name.as_ref().and_then(|t| resolver.resolve_type(t, false));
                let member = resolver.registry.add_member(MemberDescriptor {
                    name: name.clone(),
                    declaring_type: type_id,
                    modifiers,
                    kind: MemberKind::Constant { ty: declared },
                });
                declare_single(resolver, &mut names, &name, member, declaration.location);
                resolver.constants.insert(
                    member,
                    ConstantSlot::Unresolved {
                        initializer,
                        declared,
                        namespace: item.namespace.clone(),
                        container: type_id,
                        location: declaration.location,
                    },
                );
            }

            AstMemberKind::Method(method) | AstMemberKind::Constructor(method) => {
                define_method_member(
                    resolver,
                    item,
                    &mut names,
                    method,
                    modifiers,
                    is_constructor,
                );
            }

            AstMemberKind::Property(property) => {
                let ty = match &property.type_name {
                    Some(type_name) => resolver.resolve_type(type_name, false),
                    None => Some(resolver.registry.object()),
                };
                let Some(ty) = ty else { continue };
                let parameters =
                    resolve_parameters(resolver, &property.parameters);
                let bodiless = property.getter.is_none() && property.setter.is_none();
                let readable = if bodiless {
                    !modifiers.contains(Modifiers::WRITE_ONLY)
                } else {
                    property.getter.is_some()
                };
                let writable = if bodiless {
                    !modifiers.contains(Modifiers::READ_ONLY)
                } else {
                    property.setter.is_some()
                };
                let member = resolver.registry.add_member(MemberDescriptor {
                    name: property.name.clone(),
                    declaring_type: type_id,
                    modifiers,
                    kind: MemberKind::Property {
                        ty,
                        parameters,
                        readable,
                        writable,
                    },
                });
                declare_single(
                    resolver,
                    &mut names,
                    &property.name,
                    member,
                    declaration.location,
                );
                item.properties.push(PropertyWork {
                    member,
                    modifiers,
                    getter: property.getter,
                    setter: property.setter,
                });
            }

            AstMemberKind::Event { name, parameters } => {
                let parameters = resolve_parameters(resolver, &parameters);
                let member = resolver.registry.add_member(MemberDescriptor {
                    name: name.clone(),
                    declaring_type: type_id,
                    modifiers,
                    kind: MemberKind::Event { parameters },
                });
                declare_single(resolver, &mut names, &name, member, declaration.location);
            }
        }
    }
}

/// Declares a non-method member name, reporting conflicts.
fn declare_single(
    resolver: &mut Resolver<'_>,
    names: &mut crate::semantic_analysis::DeclarationSpace<Vec<MemberId>>,
    name: &EcoString,
    member: MemberId,
    location: Location,
) {
    match names.declare(name, vec![member]) {
        DeclareResult::Ok => {}
        _ => {
            resolver.diagnostics.error(
                codes::NAME_EXISTS,
                location,
                format!("'{name}' is already declared in this type"),
            );
        }
    }
}

fn define_method_member(
    resolver: &mut Resolver<'_>,
    item: &mut TypeWork,
    names: &mut crate::semantic_analysis::DeclarationSpace<Vec<MemberId>>,
    method: MethodDeclaration,
    modifiers: Modifiers,
    is_constructor: bool,
) {
    let signature = resolve_signature(resolver, &method.parameters, method.return_type.as_ref());

    // Methods overload: the name maps to a group, and only an exact
    // parameter-type duplicate is a conflict.
    let existing = names.lookup(&method.name).cloned().unwrap_or_default();
    for &other in &existing {
        if let Some(other_signature) = resolver.registry.member(other).signature() {
            if other_signature.same_parameters(&signature) {
                resolver.diagnostics.error(
                    codes::DUPLICATE_SIGNATURE,
                    method.location,
                    format!(
                        "'{}' is already declared with the same parameter types",
                        method.name
                    ),
                );
                return;
            }
        } else {
            resolver.diagnostics.error(
                codes::NAME_EXISTS,
                method.location,
                format!("'{}' is already declared in this type", method.name),
            );
            return;
        }
    }

    let kind = if is_constructor {
        MemberKind::Constructor {
            signature: signature.clone(),
        }
    } else {
        MemberKind::Method {
            signature: signature.clone(),
        }
    };
    let member = resolver.registry.add_member(MemberDescriptor {
        name: method.name.clone(),
        declaring_type: item.id,
        modifiers,
        kind,
    });
    if existing.is_empty() {
        let _ = names.declare(&method.name, vec![member]);
    } else if let Some(group) = names.lookup_mut(&method.name) {
        group.push(member);
    }

    // Explicit interface implementations, resolved while the scope is
    // at hand.
    let mut implements = Vec::new();
    for (interface_name, method_name) in &method.implements {
        if let Some(interface) = resolver.resolve_type(interface_name, false) {
            if resolver.registry.descriptor(interface).is_interface() {
                implements.push((interface, method_name.clone()));
            } else {
                let full_name = resolver.registry.descriptor(interface).full_name.clone();
                resolver.diagnostics.error(
                    codes::NOT_A_TYPE,
                    interface_name.location,
                    format!("'{full_name}' is not an interface"),
                );
            }
        }
    }

    item.methods.push(MethodWork {
        member,
        body: method.body,
        implements,
        modifiers,
        is_function: method.is_function,
        is_constructor,
    });
}

fn resolve_signature(
    resolver: &mut Resolver<'_>,
    parameters: &[ParameterDeclaration],
    return_type: Option<&crate::ast::TypeName>,
) -> MethodSignature {
    MethodSignature {
        parameters: resolve_parameters(resolver, parameters),
        return_type: return_type.and_then(|t| resolver.resolve_type(t, false)),
    }
}

fn resolve_parameters(
    resolver: &mut Resolver<'_>,
    parameters: &[ParameterDeclaration],
) -> Vec<ParameterSig> {
    let mut resolved = Vec::new();
    let mut seen: Vec<EcoString> = Vec::new();
    for (index, parameter) in parameters.iter().enumerate() {
        if seen
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&parameter.name))
        {
            resolver.diagnostics.error(
                codes::DUPLICATE_PARAMETER,
                parameter.location,
                format!("parameter '{}' is repeated", parameter.name),
            );
            continue;
        }
        seen.push(parameter.name.clone());

        if parameter.modifiers.contains(Modifiers::PARAM_ARRAY) && index + 1 != parameters.len() {
            resolver.diagnostics.error(
                codes::SYNTAX_ERROR,
                parameter.location,
                "a 'ParamArray' parameter must come last",
            );
        }

        let ty = match &parameter.type_name {
            Some(type_name) => resolver.resolve_type(type_name, false),
            None => Some(resolver.registry.object()),
        };
        let Some(ty) = ty else { continue };

        let default = parameter.default.as_ref().and_then(|expr| {
            let value = resolver.resolve_constant_expr(expr).ok()?;
            match resolver.registry.descriptor(ty).primitive_kind() {
                Some(primitive) => value.convert_to(primitive).ok(),
                None => Some(value),
            }
        });

        resolved.push(ParameterSig {
            name: parameter.name.clone(),
            ty,
            modifiers: parameter.modifiers,
            default,
        });
    }
    resolved
}

/// Evaluates an enum's members in declaration order: an omitted value
/// is the previous member's value plus one, computed in the underlying
/// type; stepping past its range is a conversion error.
fn define_enum_members(
    resolver: &mut Resolver<'_>,
    type_id: TypeId,
    members: &[EnumMemberDeclaration],
) {
    let TypeKind::Enum { underlying } = resolver.registry.descriptor(type_id).kind else {
        return;
    };
    let (min, max) = underlying.integral_range().expect("underlying is integral");
    let mut names: crate::semantic_analysis::DeclarationSpace<Vec<MemberId>> =
        crate::semantic_analysis::DeclarationSpace::new();
    let mut next_value: i128 = 0;
    let mut previous_failed = false;

    for member in members {
        let value = match &member.value {
            Some(expr) => {
                let resolved = resolver
                    .resolve_constant_expr(expr)
                    .and_then(|value| {
                        value.convert_to(underlying).map_err(|error| {
                            resolver.report_constant_error(error, member.location)
                        })
                    });
                match resolved {
                    Ok(ConstantValue::Int { value, .. }) => {
                        previous_failed = false;
                        value
                    }
                    _ => {
                        previous_failed = true;
                        continue;
                    }
                }
            }
            None => {
                if previous_failed {
                    continue;
                }
                if next_value < min || next_value > max {
                    resolver.diagnostics.error(
                        codes::CONSTANT_NOT_REPRESENTABLE,
                        member.location,
                        format!(
                            "enumeration value {next_value} cannot be converted to '{}'",
                            underlying.name()
                        ),
                    );
                    previous_failed = true;
                    continue;
                }
                next_value
            }
        };

        let id = resolver.registry.add_member(MemberDescriptor {
            name: member.name.clone(),
            declaring_type: type_id,
            modifiers: Modifiers::PUBLIC,
            kind: MemberKind::EnumMember { value },
        });
        if !names.declare(&member.name, vec![id]).is_ok() {
            resolver.diagnostics.error(
                codes::NAME_EXISTS,
                member.location,
                format!("'{}' is already declared in this enumeration", member.name),
            );
        }
        next_value = value + 1;
    }
}

/// Sets up the synthesized `Me` tracking for a structure constructor:
/// `Me` occupies a flow slot whose members are the structure's instance
/// fields, and every field must be assigned on every path.
fn prepare_structure_constructor(resolver: &mut Resolver<'_>, ty: TypeId, method: &MethodWork) {
    if !method.is_constructor {
        return;
    }
    if !matches!(resolver.registry.descriptor(ty).kind, TypeKind::Structure) {
        return;
    }
    let count = resolver.registry.structure_field_count(ty);
    if count == 0 {
        return;
    }
    if let Ok(index) = resolver.blocks.declare_variable(
        crate::semantic_analysis::BlockId::ROOT,
        "Me",
        Some(ty),
        count,
        Location::NULL,
    ) {
        resolver.method.me_slot = resolver.blocks.variables[index].slot;
    }
}

/// Attribute application sites below the type level.
fn collect_member_attribute_sites(
    decl: &TypeDeclaration,
) -> Vec<(Vec<crate::ast::AttributeUsage>, AttributeTargetKind)> {
    let members = match &decl.kind {
        TypeDeclKind::Class { members, .. }
        | TypeDeclKind::Structure { members, .. }
        | TypeDeclKind::Interface { members, .. }
        | TypeDeclKind::Module { members } => members,
        TypeDeclKind::Enum { .. } | TypeDeclKind::Delegate { .. } => return Vec::new(),
    };
    members
        .iter()
        .filter(|member| !member.attributes.is_empty())
        .map(|member| {
            let kind = match &member.kind {
                AstMemberKind::Field { .. } => AttributeTargetKind::Field,
                AstMemberKind::Constant { .. } => AttributeTargetKind::Field,
                AstMemberKind::Method(_) => AttributeTargetKind::Method,
                AstMemberKind::Constructor(_) => AttributeTargetKind::Constructor,
                AstMemberKind::Property(_) => AttributeTargetKind::Property,
                AstMemberKind::Event { .. } => AttributeTargetKind::Event,
            };
            (member.attributes.clone(), kind)
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::CollectingEmitter;

    fn compile_sources(sources: &[&str]) -> (CompilationSession, ResolvedProgram) {
        let mut session = CompilationSession::new(CompilerOptions::default());
        for (index, source) in sources.iter().enumerate() {
            session.add_source(format!("test{index}.brio"), source);
        }
        let program = session.compile();
        (session, program)
    }

    fn compile(source: &str) -> (CompilationSession, ResolvedProgram) {
        compile_sources(&[source])
    }

    fn assert_clean(source: &str) -> (CompilationSession, ResolvedProgram) {
        let (session, program) = compile(source);
        assert!(
            !session.diagnostics.has_errors(),
            "unexpected diagnostics: {:?}",
            session.diagnostics.reported()
        );
        assert!(program.success);
        (session, program)
    }

    fn enum_values(session: &CompilationSession, name: &str) -> Vec<i128> {
        let ty = session.registry.lookup_full_name(name).unwrap();
        session
            .registry
            .descriptor(ty)
            .members
            .iter()
            .filter_map(|&id| match session.registry.member(id).kind {
                MemberKind::EnumMember { value } => Some(value),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_compilation_succeeds() {
        let (_, program) = assert_clean("");
        assert!(program.types.is_empty());
    }

    #[test]
    fn enum_members_auto_increment_from_zero() {
        let (session, _) = assert_clean("Enum Channel As Byte\nLeft\nRight\nBoth\nEnd Enum");
        assert_eq!(enum_values(&session, "Channel"), vec![0, 1, 2]);
    }

    #[test]
    fn enum_auto_increment_past_the_underlying_range_reports() {
        let (session, _) =
            compile("Enum Big As Byte\nA\nB = 255\nC\nEnd Enum");
        assert!(
            session
                .diagnostics
                .has_code(codes::CONSTANT_NOT_REPRESENTABLE)
        );
        // The members before the overflow still resolved.
        assert_eq!(enum_values(&session, "Big"), vec![0, 255]);
    }

    #[test]
    fn enum_explicit_values_feed_the_increment() {
        let (session, _) = assert_clean("Enum Steps\nA = 10\nB\nC = 20\nD\nEnd Enum");
        assert_eq!(enum_values(&session, "Steps"), vec![10, 11, 20, 21]);
    }

    #[test]
    fn enum_underlying_type_must_be_integral() {
        let (session, _) = compile("Enum Bad As Double\nA\nEnd Enum");
        assert!(
            session
                .diagnostics
                .has_code(codes::ENUM_UNDERLYING_NOT_INTEGRAL)
        );
    }

    #[test]
    fn circular_constants_terminate_with_a_diagnostic() {
        let (session, _) = compile(
            "Class Config\nConst A As Integer = B\nConst B As Integer = A\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::CIRCULAR_CONSTANT));
    }

    #[test]
    fn constants_reference_each_other_acyclically() {
        let (session, _) = assert_clean(
            "Class Config\nConst Base As Integer = 8\nConst Twice As Integer = Base * 2\nEnd Class",
        );
        assert!(!session.diagnostics.has_errors());
    }

    #[test]
    fn constant_narrowing_checks_the_value() {
        let (session, _) = compile("Class C\nConst Tiny As Byte = 300\nEnd Class");
        assert!(
            session
                .diagnostics
                .has_code(codes::CONSTANT_NOT_REPRESENTABLE)
        );
    }

    #[test]
    fn outer_variable_then_inner_shadow_is_legal() {
        assert_clean(
            "Class Scopes\nSub M()\nDim x As Integer\nIf True Then\nDim x As Integer\nEnd If\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn inner_variable_then_outer_declaration_is_rejected() {
        let (session, _) = compile(
            "Class Scopes\nSub M()\nIf True Then\nDim x As Integer\nEnd If\nDim x As Integer\nEnd Sub\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::NAME_USED_IN_CHILD_SCOPE)
        );
    }

    #[test]
    fn compound_assignment_requires_implicit_rhs() {
        // Double folds into Short explicitly, but the untransformed
        // right-hand side must also convert implicitly — and Double to
        // Short does not.
        let (session, _) = compile(
            "Class Wallet\nSub M()\nDim x As Short\nDim y As Double\nx = 0\ny = 0\nx += y\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::NO_IMPLICIT_CONVERSION));
    }

    #[test]
    fn compound_assignment_succeeds_when_both_steps_hold() {
        assert_clean(
            "Class Wallet\nSub M()\nDim a As Short\nDim b As Short\na = 0\nb = 0\na += b\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn assignment_in_one_branch_leaves_variable_unassigned() {
        let (session, _) = compile(
            "Class Flow\nSub M(flag As Boolean)\nDim v As Integer\nIf flag Then\nv = 1\nEnd If\nDim w As Integer\nw = v\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::USE_OF_UNASSIGNED));
    }

    #[test]
    fn assignment_in_every_branch_counts_after_the_merge() {
        assert_clean(
            "Class Flow\nSub M(flag As Boolean)\nDim v As Integer\nIf flag Then\nv = 1\nElse\nv = 2\nEnd If\nDim w As Integer\nw = v\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn interface_satisfied_by_inherited_method_synthesizes_a_proxy() {
        let (session, program) = assert_clean(
            "Interface IGreeter\nSub Greet(name As String)\nEnd Interface\n\
             Class Base\nSub Welcome(name As String)\nEnd Sub\nEnd Class\n\
             Class Greeter\nInherits Base\nImplements IGreeter\nEnd Class",
        );
        assert!(!session.diagnostics.has_errors());
        let greeter = session.registry.lookup_full_name("Greeter").unwrap();
        let resolved = program.types.iter().find(|t| t.ty == greeter).unwrap();
        assert_eq!(resolved.proxies.len(), 1);
        assert_eq!(resolved.proxies[0].name, "Greet");
    }

    #[test]
    fn unimplemented_interface_member_reports() {
        let (session, _) = compile(
            "Interface IGreeter\nSub Greet(name As String)\nEnd Interface\n\
             Class Silent\nImplements IGreeter\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::INTERFACE_MEMBER_NOT_IMPLEMENTED)
        );
    }

    #[test]
    fn explicit_implementation_under_another_name() {
        let (_, program) = assert_clean(
            "Interface IGreeter\nSub Greet(name As String)\nEnd Interface\n\
             Class Greeter\nImplements IGreeter\nSub SayHi(name As String) Implements IGreeter.Greet\nEnd Sub\nEnd Class",
        );
        let proxies: Vec<_> = program
            .types
            .iter()
            .flat_map(|t| t.proxies.iter())
            .collect();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].name, "Greet");
    }

    #[test]
    fn unimplemented_abstract_member_reports() {
        let (session, _) = compile(
            "MustInherit Class Effect\nMustOverride Sub Process(sample As Double)\nEnd Class\n\
             Class Bypass\nInherits Effect\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::ABSTRACT_MEMBER_NOT_IMPLEMENTED)
        );
    }

    #[test]
    fn abstract_class_overriding_in_subclass_is_clean() {
        assert_clean(
            "MustInherit Class Effect\nMustOverride Sub Process(sample As Double)\nEnd Class\n\
             Class Gain\nInherits Effect\nOverrides Sub Process(sample As Double)\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn qualified_names_are_stable_under_declaration_order() {
        let forward = "Namespace Audio\nClass Mixer\nEnd Class\nClass Board\nEnd Class\nEnd Namespace";
        let backward = "Namespace Audio\nClass Board\nEnd Class\nClass Mixer\nEnd Class\nEnd Namespace";
        let (session_a, _) = assert_clean(forward);
        let (session_b, _) = assert_clean(backward);
        for name in ["Audio.Mixer", "Audio.Board"] {
            let a = session_a.registry.lookup_full_name(name).unwrap();
            let b = session_b.registry.lookup_full_name(name).unwrap();
            assert_eq!(
                session_a.registry.descriptor(a).full_name,
                session_b.registry.descriptor(b).full_name
            );
        }
    }

    #[test]
    fn multi_file_compilation_merges_namespaces() {
        let (session, _) = compile_sources(&[
            "Namespace Audio\nClass Mixer\nEnd Class\nEnd Namespace",
            "Namespace Audio\nClass Board\nEnd Class\nEnd Namespace",
        ]);
        assert!(!session.diagnostics.has_errors());
        assert!(session.registry.lookup_full_name("Audio.Mixer").is_some());
        assert!(session.registry.lookup_full_name("Audio.Board").is_some());
    }

    #[test]
    fn duplicate_type_names_report_once() {
        let (session, _) = compile("Class Twice\nEnd Class\nClass Twice\nEnd Class");
        assert!(session.diagnostics.has_code(codes::NAME_EXISTS));
    }

    #[test]
    fn addressof_assignment_checks_delegate_signature() {
        assert_clean(
            "Delegate Sub Notifier(message As String)\n\
             Class Hub\nDim handler As Notifier\nSub Send(message As String)\nEnd Sub\n\
             Sub Wire()\nhandler = AddressOf Send\nEnd Sub\nEnd Class",
        );

        let (session, _) = compile(
            "Delegate Sub Notifier(message As String)\n\
             Class Hub\nDim handler As Notifier\nSub Send(count As Integer)\nEnd Sub\n\
             Sub Wire()\nhandler = AddressOf Send\nEnd Sub\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::DELEGATE_SIGNATURE_MISMATCH)
        );
    }

    #[test]
    fn structure_constructor_must_assign_every_field() {
        let (session, _) = compile(
            "Structure Point\nDim x As Integer\nDim y As Integer\n\
             Sub New(a As Integer)\nx = a\nEnd Sub\nEnd Structure",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::STRUCTURE_NOT_FULLY_ASSIGNED)
        );

        assert_clean(
            "Structure Point\nDim x As Integer\nDim y As Integer\n\
             Sub New(a As Integer, b As Integer)\nx = a\ny = b\nEnd Sub\nEnd Structure",
        );
    }

    #[test]
    fn dead_code_reports_once_per_run() {
        let (session, _) = compile(
            "Class C\nSub M()\nReturn\nDim x As Integer\nDim y As Integer\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::UNREACHABLE_CODE));
        let count = session
            .diagnostics
            .reported()
            .iter()
            .filter(|d| d.code == codes::UNREACHABLE_CODE)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn label_after_terminator_revives_reachability() {
        assert_clean(
            "Class C\nSub M()\nDim n As Integer\nn = 0\nGoTo skip\nskip:\nn = 1\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn goto_to_a_missing_label_reports() {
        let (session, _) = compile("Class C\nSub M()\nGoTo nowhere\nEnd Sub\nEnd Class");
        assert!(session.diagnostics.has_code(codes::UNDEFINED_LABEL));
    }

    #[test]
    fn unused_import_warns() {
        let (session, _) = compile("Imports Audio.Effects\nClass C\nEnd Class");
        assert!(session.diagnostics.has_code(codes::UNUSED_IMPORT));
        assert_eq!(session.diagnostics.warning_count(), 1);
        assert_eq!(session.diagnostics.error_count(), 0);
    }

    #[test]
    fn attribute_without_usage_metadata_cannot_be_verified() {
        let (session, _) = compile(
            "Class Marker\nEnd Class\n<Marker>\nClass Tagged\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::ATTRIBUTE_USAGE_UNKNOWN));
    }

    #[test]
    fn attribute_with_usage_metadata_validates_targets() {
        let source = "<AttributeUsage(1)>\nClass Marker\nEnd Class\n<Marker>\nClass Tagged\nEnd Class";
        assert_clean(source);

        // Mask 64 is methods only; applying to a class is rejected.
        let (session, _) = compile(
            "<AttributeUsage(64)>\nClass Marker\nEnd Class\n<Marker>\nClass Tagged\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::ATTRIBUTE_TARGET_INVALID)
        );
    }

    #[test]
    fn attribute_arguments_must_be_constant() {
        let (session, _) = compile(
            "<AttributeUsage(1)>\nClass Marker\nEnd Class\n<Marker(New Marker())>\nClass Tagged\nEnd Class",
        );
        assert!(
            session
                .diagnostics
                .has_code(codes::ATTRIBUTE_ARGUMENT_NOT_CONSTANT)
        );
    }

    #[test]
    fn warnings_as_errors_fails_the_compilation() {
        let mut session = CompilationSession::new(CompilerOptions {
            warnings_as_errors: true,
            ..CompilerOptions::default()
        });
        session.add_source("w.brio", "Imports Audio.Effects\nClass C\nEnd Class");
        let program = session.compile();
        assert!(!program.success);
    }

    #[test]
    fn expected_code_hook_short_circuits() {
        let mut session = CompilationSession::new(CompilerOptions {
            expected_code: Some(codes::CIRCULAR_CONSTANT),
            ..CompilerOptions::default()
        });
        session.add_source(
            "c.brio",
            "Class Config\nConst A As Integer = B\nConst B As Integer = A\nEnd Class",
        );
        let _ = session.compile();
        assert!(session.diagnostics.expected_code_seen());
    }

    #[test]
    fn emitter_receives_only_successful_programs() {
        let mut session = CompilationSession::new(CompilerOptions::default());
        session.add_source(
            "ok.brio",
            "Class Wallet\nDim balance As Integer\nSub Deposit(amount As Integer)\nbalance = balance + amount\nEnd Sub\nEnd Class",
        );
        let mut emitter = CollectingEmitter::default();
        let program = session.emit(&mut emitter);
        assert!(program.success);
        assert_eq!(emitter.type_names, vec!["Wallet"]);
        assert!(emitter.finished);
        assert!(
            emitter
                .member_names
                .contains(&("Wallet".to_string(), "Deposit".to_string()))
        );

        // A failing compilation reaches no emitter.
        let mut session = CompilationSession::new(CompilerOptions::default());
        session.add_source("bad.brio", "Class C\nDim x As MissingType\nEnd Class");
        let mut emitter = CollectingEmitter::default();
        let program = session.emit(&mut emitter);
        assert!(!program.success);
        assert!(emitter.type_names.is_empty());
    }

    #[test]
    fn resolution_is_idempotent_per_node() {
        use crate::ast::{ExprKind, Expression, NodeId};

        let mut session = CompilationSession::new(CompilerOptions::default());
        let mut resolver = Resolver::new(
            &mut session.registry,
            &mut session.diagnostics,
            &mut session.imports,
            &mut session.constants,
            EcoString::new(),
            None,
        );

        // A failing node reports once; the cached failure is silent.
        let missing = Expression::new(
            NodeId::new(1),
            Location::NULL,
            ExprKind::Name("missing".into()),
        );
        assert!(resolver.resolve_expression(&missing).is_err());
        let after_first = resolver.diagnostics.error_count();
        assert!(resolver.resolve_expression(&missing).is_err());
        assert_eq!(resolver.diagnostics.error_count(), after_first);

        // A succeeding node resolves to the identical type and class.
        let literal = Expression::new(
            NodeId::new(2),
            Location::NULL,
            ExprKind::Integer {
                value: 42,
                kind: crate::source_analysis::IntegerKind::Integer,
            },
        );
        let first = resolver.resolve_expression(&literal).unwrap();
        let second = resolver.resolve_expression(&literal).unwrap();
        assert_eq!(first.ty, second.ty);
        assert_eq!(first.class, second.class);
    }

    #[test]
    fn methods_overload_by_parameter_types() {
        assert_clean(
            "Class Printer\nSub Write(value As Integer)\nEnd Sub\nSub Write(value As String)\nEnd Sub\n\
             Sub M()\nWrite(1)\nWrite(\"hi\")\nEnd Sub\nEnd Class",
        );

        let (session, _) = compile(
            "Class Printer\nSub Write(value As Integer)\nEnd Sub\nSub Write(count As Integer)\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::DUPLICATE_SIGNATURE));
    }

    #[test]
    fn member_clashing_with_enclosing_type_name_reports() {
        let (session, _) = compile("Class Wallet\nDim wallet As Integer\nEnd Class");
        assert!(
            session
                .diagnostics
                .has_code(codes::CLASHES_WITH_ENCLOSING_TYPE)
        );
    }

    #[test]
    fn select_case_flow_is_conservative_without_case_else() {
        let (session, _) = compile(
            "Class C\nSub M(tag As Integer)\nDim v As Integer\n\
             Select Case tag\nCase 1\nv = 1\nCase 2\nv = 2\nEnd Select\n\
             Dim w As Integer\nw = v\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::USE_OF_UNASSIGNED));

        assert_clean(
            "Class C\nSub M(tag As Integer)\nDim v As Integer\n\
             Select Case tag\nCase 1\nv = 1\nCase Else\nv = 2\nEnd Select\n\
             Dim w As Integer\nw = v\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn try_catch_merges_assignments_conservatively() {
        assert_clean(
            "Class C\nSub M()\nDim v As Integer\n\
             Try\nv = 1\nCatch ex\nv = 2\nEnd Try\n\
             Dim w As Integer\nw = v\nEnd Sub\nEnd Class",
        );
    }

    #[test]
    fn indexer_property_resolves_reads_and_writes() {
        assert_clean(
            "Class Bank\nDim store As Integer\n\
             Property Slot(index As Integer) As Integer\nGet\nReturn store\nEnd Get\n\
             Set(value As Integer)\nstore = value\nEnd Set\nEnd Property\n\
             Sub M()\nDim v As Integer\nv = Slot(2)\nSlot(3) = v\nEnd Sub\nEnd Class",
        );

        // A read-only indexer rejects assignment.
        let (session, _) = compile(
            "Class Bank\nDim store As Integer\n\
             Property Slot(index As Integer) As Integer\nGet\nReturn store\nEnd Get\nEnd Property\n\
             Sub M()\nSlot(3) = 1\nEnd Sub\nEnd Class",
        );
        assert!(session.diagnostics.has_code(codes::PROPERTY_NOT_WRITABLE));
    }

    #[test]
    fn imports_alias_resolves_types() {
        let (session, _) = compile_sources(&[
            "Namespace Audio.Effects\nClass Reverb\nEnd Class\nEnd Namespace",
            "Imports FX = Audio.Effects\nClass Rack\nDim unit As FX.Reverb\nEnd Class",
        ]);
        assert!(
            !session.diagnostics.has_errors(),
            "unexpected diagnostics: {:?}",
            session.diagnostics.reported()
        );
    }

    #[test]
    fn optional_and_paramarray_calls_resolve() {
        assert_clean(
            "Class Log\nSub Write(message As String, Optional level As Integer = 1)\nEnd Sub\n\
             Sub Sum(ParamArray values As Integer())\nEnd Sub\n\
             Sub M()\nWrite(\"hi\")\nWrite(\"hi\", 3)\nSum(1, 2, 3)\nSum()\nEnd Sub\nEnd Class",
        );
    }
}
