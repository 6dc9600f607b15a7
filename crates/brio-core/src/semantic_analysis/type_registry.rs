// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! The type registry: qualified names to type descriptors.
//!
//! The registry is the shared, monotonically growing table every
//! resolution step consults. It is owned by the compilation session and
//! passed by mutable reference, so single-owner borrowing replaces the
//! process-wide statics a batch compiler might otherwise reach for.
//!
//! # Name lookup order
//!
//! [`TypeRegistry::resolve`] searches, in order:
//!
//! 1. nested types, walking the containing type and its base chain
//! 2. the current namespace and each of its dot-separated parents
//! 3. a direct (bare or fully qualified) lookup
//! 4. the compilation's import aliases
//! 5. each imported namespace — reporting an ambiguity when two imports
//!    resolve the same simple name to different types
//!
//! # Bootstrap
//!
//! [`TypeRegistry::new`] registers the built-in types in a hard-coded
//! dependency order: the roots first (`Object`, then the value root, the
//! enum and delegate roots), then the value primitives, whose bases must
//! already exist. The order is load-bearing: registering a type may
//! consult the descriptors of everything it references.

use std::collections::HashMap;

use ecow::EcoString;

use crate::ast::{Modifiers, QualifiedName, TypeName, TypeNameKind};
use crate::diagnostics::{Diagnostics, codes};
use crate::source_analysis::Location;

use super::declaration_space::{DeclarationSpace, DeclareResult};
use super::types::{
    MemberDescriptor, MemberId, MemberKind, PrimitiveKind, TypeDescriptor, TypeId, TypeKind,
    TypeState,
};

/// The per-compilation table of `Imports` directives.
#[derive(Debug, Default)]
pub struct ImportTable {
    aliases: HashMap<String, AliasEntry>,
    namespaces: Vec<NamespaceImport>,
}

#[derive(Debug)]
struct AliasEntry {
    target: EcoString,
    location: Location,
    used: bool,
}

#[derive(Debug)]
struct NamespaceImport {
    target: EcoString,
    location: Location,
    used: bool,
}

impl ImportTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an alias import. Returns `false` if the alias name is
    /// already taken.
    pub fn add_alias(&mut self, alias: &str, target: &QualifiedName, location: Location) -> bool {
        let key = alias.to_lowercase();
        if self.aliases.contains_key(&key) {
            return false;
        }
        self.aliases.insert(
            key,
            AliasEntry {
                target: target.dotted(),
                location,
                used: false,
            },
        );
        true
    }

    /// Records a plain namespace import.
    pub fn add_namespace(&mut self, target: &QualifiedName, location: Location) {
        self.namespaces.push(NamespaceImport {
            target: target.dotted(),
            location,
            used: false,
        });
    }

    /// Imports that were never consulted, for the unused-import warning.
    #[must_use]
    pub fn unused(&self) -> Vec<(EcoString, Location)> {
        let mut unused: Vec<(EcoString, Location)> = self
            .namespaces
            .iter()
            .filter(|import| !import.used)
            .map(|import| (import.target.clone(), import.location))
            .collect();
        unused.extend(
            self.aliases
                .values()
                .filter(|alias| !alias.used)
                .map(|alias| (alias.target.clone(), alias.location)),
        );
        unused
    }
}

/// The scope a type lookup starts from.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveScope<'a> {
    /// Dotted current namespace (empty at the root).
    pub namespace: &'a str,
    /// The type whose body is being resolved, for nested-type lookup.
    pub containing_type: Option<TypeId>,
}

/// The registry of all known types and their members.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    members: Vec<MemberDescriptor>,
    by_name: HashMap<String, TypeId>,
    /// Per-namespace declaration spaces, for duplicate detection.
    namespaces: HashMap<String, DeclarationSpace<TypeId>>,
    arrays: HashMap<TypeId, TypeId>,
    object: TypeId,
    value_root: TypeId,
    enum_root: TypeId,
    delegate_root: TypeId,
    void: TypeId,
    primitives: HashMap<PrimitiveKind, TypeId>,
}

impl TypeRegistry {
    /// Creates a registry with the built-in types bootstrapped.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            members: Vec::new(),
            by_name: HashMap::new(),
            namespaces: HashMap::new(),
            arrays: HashMap::new(),
            object: TypeId::new(0),
            value_root: TypeId::new(0),
            enum_root: TypeId::new(0),
            delegate_root: TypeId::new(0),
            void: TypeId::new(0),
            primitives: HashMap::new(),
        };
        registry.bootstrap();
        registry
    }

    /// Registers the fixed builtin set. Roots come before the value
    /// primitives that name them as bases; a type whose base is missing
    /// at registration time would be an internal error.
    fn bootstrap(&mut self) {
        self.object = self.register_builtin("Object", TypeKind::Object, None);
        self.value_root = self.register_builtin("ValueType", TypeKind::ValueRoot, Some(self.object));
        self.enum_root = self.register_builtin("Enum", TypeKind::EnumRoot, Some(self.value_root));
        self.delegate_root =
            self.register_builtin("Delegate", TypeKind::DelegateRoot, Some(self.object));
        self.void = self.register_builtin("Void", TypeKind::Void, Some(self.value_root));

        for kind in [
            PrimitiveKind::Boolean,
            PrimitiveKind::Byte,
            PrimitiveKind::SByte,
            PrimitiveKind::Short,
            PrimitiveKind::UShort,
            PrimitiveKind::Integer,
            PrimitiveKind::UInteger,
            PrimitiveKind::Long,
            PrimitiveKind::ULong,
            PrimitiveKind::Single,
            PrimitiveKind::Double,
            PrimitiveKind::Decimal,
            PrimitiveKind::Char,
            PrimitiveKind::Date,
        ] {
            let id = self.register_builtin(kind.name(), TypeKind::Primitive(kind), Some(self.value_root));
            self.primitives.insert(kind, id);
        }
        // String is the one reference-typed primitive.
        let string = self.register_builtin(
            PrimitiveKind::Str.name(),
            TypeKind::Primitive(PrimitiveKind::Str),
            Some(self.object),
        );
        self.primitives.insert(PrimitiveKind::Str, string);
    }

    fn register_builtin(&mut self, name: &str, kind: TypeKind, base: Option<TypeId>) -> TypeId {
        let id = TypeId::new(u32::try_from(self.types.len()).expect("type count fits u32"));
        self.types.push(TypeDescriptor {
            full_name: EcoString::from(name),
            simple_name: EcoString::from(name),
            kind,
            base,
            interfaces: Vec::new(),
            members: Vec::new(),
            modifiers: Modifiers::PUBLIC,
            state: TypeState::Defined,
        });
        self.by_name.insert(name.to_lowercase(), id);
        id
    }

    // === Builtin accessors ===

    /// The universal root type.
    #[must_use]
    pub const fn object(&self) -> TypeId {
        self.object
    }

    /// The root of all value types.
    #[must_use]
    pub const fn value_root(&self) -> TypeId {
        self.value_root
    }

    /// The root of all enumerations.
    #[must_use]
    pub const fn enum_root(&self) -> TypeId {
        self.enum_root
    }

    /// The root of all delegates.
    #[must_use]
    pub const fn delegate_root(&self) -> TypeId {
        self.delegate_root
    }

    /// The `Sub` return type.
    #[must_use]
    pub const fn void(&self) -> TypeId {
        self.void
    }

    /// The registered id of a primitive.
    ///
    /// # Panics
    /// Panics if called before bootstrap, which `new` rules out.
    #[must_use]
    pub fn primitive(&self, kind: PrimitiveKind) -> TypeId {
        self.primitives[&kind]
    }

    /// Looks up a builtin by source name (`Integer`, `String`, ...).
    #[must_use]
    pub fn lookup_builtin(&self, name: &str) -> Option<TypeId> {
        let id = *self.by_name.get(&name.to_lowercase())?;
        let descriptor = self.descriptor(id);
        matches!(
            descriptor.kind,
            TypeKind::Primitive(_) | TypeKind::Object | TypeKind::Void
        )
        .then_some(id)
    }

    // === Registration ===

    /// Registers a user-declared type under its namespace. Returns the
    /// new id, or the conflict that kept it out of the namespace's
    /// declaration space.
    pub fn register(
        &mut self,
        namespace: &str,
        descriptor: TypeDescriptor,
    ) -> Result<TypeId, DeclareResult> {
        let space = self
            .namespaces
            .entry(namespace.to_lowercase())
            .or_default();
        let id = TypeId::new(u32::try_from(self.types.len()).expect("type count fits u32"));
        let result = space.declare(&descriptor.simple_name, id);
        if !result.is_ok() {
            return Err(result);
        }
        self.by_name
            .insert(descriptor.full_name.to_lowercase().to_string(), id);
        self.types.push(descriptor);
        Ok(id)
    }

    /// The descriptor behind an id.
    ///
    /// # Panics
    /// Panics on an id from a different registry; ids are never
    /// fabricated.
    #[must_use]
    pub fn descriptor(&self, id: TypeId) -> &TypeDescriptor {
        &self.types[id.index()]
    }

    /// Mutable access to a descriptor.
    pub fn descriptor_mut(&mut self, id: TypeId) -> &mut TypeDescriptor {
        &mut self.types[id.index()]
    }

    /// Adds a member and links it to its declaring type.
    pub fn add_member(&mut self, member: MemberDescriptor) -> MemberId {
        let id = MemberId::new(u32::try_from(self.members.len()).expect("member count fits u32"));
        let declaring = member.declaring_type;
        self.members.push(member);
        self.types[declaring.index()].members.push(id);
        id
    }

    /// The member behind an id.
    #[must_use]
    pub fn member(&self, id: MemberId) -> &MemberDescriptor {
        &self.members[id.index()]
    }

    /// Mutable access to a member.
    pub fn member_mut(&mut self, id: MemberId) -> &mut MemberDescriptor {
        &mut self.members[id.index()]
    }

    /// The array type over `element`, created on first use.
    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        if let Some(&existing) = self.arrays.get(&element) {
            return existing;
        }
        let mut full_name = self.descriptor(element).full_name.clone();
        full_name.push_str("()");
        let mut simple_name = self.descriptor(element).simple_name.clone();
        simple_name.push_str("()");
        let id = TypeId::new(u32::try_from(self.types.len()).expect("type count fits u32"));
        self.types.push(TypeDescriptor {
            full_name,
            simple_name,
            kind: TypeKind::Array { element },
            base: Some(self.object),
            interfaces: Vec::new(),
            members: Vec::new(),
            modifiers: Modifiers::PUBLIC,
            state: TypeState::Defined,
        });
        self.arrays.insert(element, id);
        id
    }

    // === Lookup ===

    /// Direct lookup by dotted full name.
    #[must_use]
    pub fn lookup_full_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Returns `true` if `prefix` names a namespace (or a parent of
    /// one) that has registered types.
    #[must_use]
    pub fn is_namespace(&self, prefix: &str) -> bool {
        let key = prefix.to_lowercase();
        let nested = format!("{key}.");
        self.namespaces
            .keys()
            .any(|namespace| *namespace == key || namespace.starts_with(&nested))
    }

    /// Resolves a (possibly dotted) source name to a type, following
    /// the five-step search order. With `silent` the "type not found"
    /// diagnostic is suppressed, for probing lookups.
    pub fn resolve(
        &self,
        scope: ResolveScope<'_>,
        imports: &mut ImportTable,
        name: &QualifiedName,
        silent: bool,
        location: Location,
        diagnostics: &mut Diagnostics,
    ) -> Option<TypeId> {
        let dotted = name.dotted();

        // (a) Nested types, walking the containing type's base chain.
        if let Some(container) = scope.containing_type {
            for ancestor in self.base_chain_inclusive(container) {
                let qualified = format!("{}.{dotted}", self.descriptor(ancestor).full_name);
                if let Some(id) = self.lookup_full_name(&qualified) {
                    return Some(id);
                }
            }
        }

        // (b) The current namespace and its dot-separated parents.
        let mut namespace = scope.namespace;
        loop {
            if namespace.is_empty() {
                break;
            }
            let qualified = format!("{namespace}.{dotted}");
            if let Some(id) = self.lookup_full_name(&qualified) {
                return Some(id);
            }
            namespace = match namespace.rfind('.') {
                Some(index) => &namespace[..index],
                None => "",
            };
        }

        // (c) Bare or fully qualified direct lookup.
        if let Some(id) = self.lookup_full_name(&dotted) {
            return Some(id);
        }

        // (d) Import aliases substitute for the first segment.
        let first_key = name.0[0].to_lowercase();
        if let Some(alias) = imports.aliases.get_mut(first_key.as_str()) {
            alias.used = true;
            let target = alias.target.clone();
            let qualified = if name.0.len() == 1 {
                target.to_string()
            } else {
                format!("{target}.{}", QualifiedName(name.0[1..].to_vec()).dotted())
            };
            if let Some(id) = self.lookup_full_name(&qualified) {
                return Some(id);
            }
        }

        // (e) Imported namespaces, with ambiguity detection.
        let mut found: Option<(TypeId, EcoString)> = None;
        let mut ambiguous = false;
        for import in &mut imports.namespaces {
            let qualified = format!("{}.{dotted}", import.target);
            if let Some(id) = self.lookup_full_name(&qualified) {
                import.used = true;
                match &found {
                    Some((existing, first_source)) if *existing != id => {
                        if !ambiguous && !silent {
                            diagnostics.error(
                                codes::AMBIGUOUS_IMPORTED_TYPE,
                                location,
                                format!(
                                    "'{dotted}' is ambiguous between imported namespaces \
                                     '{first_source}' and '{}'",
                                    import.target
                                ),
                            );
                        }
                        ambiguous = true;
                    }
                    Some(_) => {}
                    None => found = Some((id, import.target.clone())),
                }
            }
        }
        if ambiguous {
            return None;
        }
        if let Some((id, _)) = found {
            return Some(id);
        }

        if !silent {
            diagnostics.error(
                codes::TYPE_NOT_FOUND,
                location,
                format!("type '{dotted}' is not defined"),
            );
        }
        None
    }

    /// Resolves a source type reference, wrapping arrays as needed.
    pub fn resolve_type_name(
        &mut self,
        scope: ResolveScope<'_>,
        imports: &mut ImportTable,
        type_name: &TypeName,
        silent: bool,
        diagnostics: &mut Diagnostics,
    ) -> Option<TypeId> {
        match &type_name.kind {
            TypeNameKind::Named(name) => self.resolve(
                scope,
                imports,
                name,
                silent,
                type_name.location,
                diagnostics,
            ),
            TypeNameKind::Array { element } => {
                let element = self.resolve_type_name(scope, imports, element, silent, diagnostics)?;
                Some(self.array_of(element))
            }
        }
    }

    // === Hierarchy queries ===

    /// The base chain starting at `ty` itself. Cycle-safe.
    #[must_use]
    pub fn base_chain_inclusive(&self, ty: TypeId) -> Vec<TypeId> {
        let mut chain = vec![ty];
        let mut current = self.descriptor(ty).base;
        while let Some(id) = current {
            if chain.contains(&id) {
                break;
            }
            chain.push(id);
            current = self.descriptor(id).base;
        }
        chain
    }

    /// Returns `true` if `derived` is `base` or inherits from it.
    #[must_use]
    pub fn is_or_inherits(&self, derived: TypeId, base: TypeId) -> bool {
        self.base_chain_inclusive(derived).contains(&base)
    }

    /// Returns `true` if `ty` (or an ancestor) lists `interface`,
    /// directly or through interface inheritance.
    #[must_use]
    pub fn implements(&self, ty: TypeId, interface: TypeId) -> bool {
        for ancestor in self.base_chain_inclusive(ty) {
            for &direct in &self.descriptor(ancestor).interfaces {
                if direct == interface || self.interface_extends(direct, interface) {
                    return true;
                }
            }
        }
        false
    }

    fn interface_extends(&self, interface: TypeId, target: TypeId) -> bool {
        let mut stack = vec![interface];
        let mut seen = vec![];
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            seen.push(current);
            stack.extend(self.descriptor(current).interfaces.iter().copied());
        }
        false
    }

    /// Members of `ty` itself with the given name (case-insensitive).
    #[must_use]
    pub fn own_members_named(&self, ty: TypeId, name: &str) -> Vec<MemberId> {
        self.descriptor(ty)
            .members
            .iter()
            .copied()
            .filter(|&id| self.member(id).name.eq_ignore_ascii_case(name))
            .collect()
    }

    /// Members with the given name found on `ty` or the nearest
    /// ancestor that declares any. Matching stops at the first type
    /// with a hit, so derived members hide base members of the same
    /// name.
    #[must_use]
    pub fn members_named(&self, ty: TypeId, name: &str) -> Vec<MemberId> {
        for ancestor in self.base_chain_inclusive(ty) {
            let found = self.own_members_named(ancestor, name);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// The number of instance fields of a structure, for per-member
    /// definite-assignment tracking.
    #[must_use]
    pub fn structure_field_count(&self, ty: TypeId) -> u32 {
        let descriptor = self.descriptor(ty);
        if !matches!(descriptor.kind, TypeKind::Structure) {
            return 0;
        }
        let count = descriptor
            .members
            .iter()
            .filter(|&&id| {
                let member = self.member(id);
                matches!(member.kind, MemberKind::Field { .. }) && !member.modifiers.is_shared()
            })
            .count();
        u32::try_from(count).expect("field count fits u32")
    }

    /// The index of an instance field among a structure's instance
    /// fields, in declaration order.
    #[must_use]
    pub fn structure_field_index(&self, ty: TypeId, name: &str) -> Option<u32> {
        let descriptor = self.descriptor(ty);
        let mut index = 0u32;
        for &id in &descriptor.members {
            let member = self.member(id);
            if matches!(member.kind, MemberKind::Field { .. }) && !member.modifiers.is_shared() {
                if member.name.eq_ignore_ascii_case(name) {
                    return Some(index);
                }
                index += 1;
            }
        }
        None
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
