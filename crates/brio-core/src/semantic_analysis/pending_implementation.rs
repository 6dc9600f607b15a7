// Copyright 2026 James Casey
// SPDX-License-Identifier: Apache-2.0

//! Tracking of abstract and interface members a type must still
//! implement.
//!
//! When a type's bases and interfaces are defined, the tracker gathers
//! the **required members**:
//!
//! - every `MustOverride` method inherited through the base chain,
//!   flattened nearest-override-first so a method overridden partway up
//!   is not counted twice, and
//! - every method of each **directly listed** interface. Transitively
//!   inherited interfaces are deliberately excluded — their members are
//!   already satisfied by the base type that listed them.
//!
//! The type's own members then clear matching entries. A member whose
//! `Implements` clause names an interface method with a different name
//! satisfies the requirement through a synthesized forwarding proxy, as
//! does a match found on the base class (the parent's member cannot be
//! wired to the interface slot directly). Whatever interface entries
//! remain after the base-class sweep are reported as errors; leftover
//! abstract entries are always errors, with no proxy path.

use ecow::EcoString;

use crate::diagnostics::{Diagnostics, codes};
use crate::source_analysis::Location;

use super::type_registry::TypeRegistry;
use super::types::{MemberId, MemberKind, MethodSignature, TypeId};

/// Why a member is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequirementKind {
    /// Declared by a directly listed interface.
    Interface,
    /// Declared `MustOverride` in the base chain.
    Abstract,
}

/// One required member and its satisfaction state.
#[derive(Debug, Clone)]
struct RequiredMember {
    /// The interface or abstract base that demands the member.
    origin: TypeId,
    /// The required method name.
    name: EcoString,
    /// The required signature.
    signature: MethodSignature,
    kind: RequirementKind,
    satisfied: bool,
}

/// A synthesized forwarding method: satisfies an interface requirement
/// by calling an existing, differently named or inherited member.
#[derive(Debug, Clone)]
pub struct ProxyMethod {
    /// The interface whose requirement the proxy satisfies.
    pub interface: TypeId,
    /// The synthesized method's name (the interface method's name).
    pub name: EcoString,
    /// The synthesized method's signature.
    pub signature: MethodSignature,
    /// The existing member the proxy forwards to.
    pub forwards_to: MemberId,
}

/// An internal bookkeeping inconsistency.
///
/// Distinct from user diagnostics: it cannot occur on valid input, and
/// the driver surfaces it as an internal error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("pending-implementation entry for '{name}' satisfied twice")]
pub struct PendingInconsistency {
    /// The doubly-satisfied member name.
    pub name: EcoString,
}

/// The pending-implementation state for one type.
#[derive(Debug)]
pub struct PendingImplementations {
    ty: TypeId,
    required: Vec<RequiredMember>,
}

impl PendingImplementations {
    /// Gathers the required members for `ty`. Call once the type's base
    /// chain and interface list are defined.
    #[must_use]
    pub fn gather(registry: &TypeRegistry, ty: TypeId) -> Self {
        let mut required = Vec::new();

        // An abstract type may leave inherited abstract methods to its
        // own subclasses; only concrete types owe them.
        let is_abstract = registry
            .descriptor(ty)
            .modifiers
            .contains(crate::ast::Modifiers::MUST_INHERIT);

        // Abstract methods from the base chain, nearest first. A
        // concrete method seen closer to `ty` hides any farther
        // abstract declaration with the same name and signature.
        let mut concrete: Vec<(EcoString, MethodSignature)> = Vec::new();
        for ancestor in registry.base_chain_inclusive(ty).into_iter().skip(1) {
            if is_abstract {
                break;
            }
            for &member_id in &registry.descriptor(ancestor).members {
                let member = registry.member(member_id);
                let Some(signature) = member.signature() else {
                    continue;
                };
                let is_abstract = member
                    .modifiers
                    .contains(crate::ast::Modifiers::MUST_OVERRIDE);
                if is_abstract {
                    let already_overridden = concrete.iter().any(|(name, sig)| {
                        name.eq_ignore_ascii_case(&member.name) && sig.matches(signature)
                    });
                    let already_required = required.iter().any(|req: &RequiredMember| {
                        req.name.eq_ignore_ascii_case(&member.name)
                            && req.signature.matches(signature)
                    });
                    if !already_overridden && !already_required {
                        required.push(RequiredMember {
                            origin: ancestor,
                            name: member.name.clone(),
                            signature: signature.clone(),
                            kind: RequirementKind::Abstract,
                            satisfied: false,
                        });
                    }
                } else {
                    concrete.push((member.name.clone(), signature.clone()));
                }
            }
        }

        // Methods of directly listed interfaces only.
        for &interface in &registry.descriptor(ty).interfaces {
            for &member_id in &registry.descriptor(interface).members {
                let member = registry.member(member_id);
                if let Some(signature) = member.signature() {
                    required.push(RequiredMember {
                        origin: interface,
                        name: member.name.clone(),
                        signature: signature.clone(),
                        kind: RequirementKind::Interface,
                        satisfied: false,
                    });
                }
            }
        }

        Self { ty, required }
    }

    /// Number of entries still unsatisfied.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.required.iter().filter(|req| !req.satisfied).count()
    }

    /// Offers one of the type's own members. Returns any proxies the
    /// member's explicit `Implements` clauses demand.
    ///
    /// # Errors
    /// A doubly satisfied entry is a bookkeeping inconsistency.
    pub fn satisfy_member(
        &mut self,
        registry: &TypeRegistry,
        member_id: MemberId,
        implements: &[(TypeId, EcoString)],
    ) -> Result<Vec<ProxyMethod>, PendingInconsistency> {
        let member = registry.member(member_id);
        let Some(signature) = member.signature() else {
            return Ok(Vec::new());
        };
        let mut proxies = Vec::new();

        // Explicitly qualified implementations first.
        for (interface, method_name) in implements {
            for req in &mut self.required {
                if req.kind == RequirementKind::Interface
                    && req.origin == *interface
                    && req.name.eq_ignore_ascii_case(method_name)
                    && req.signature.matches(signature)
                {
                    if req.satisfied {
                        return Err(PendingInconsistency {
                            name: req.name.clone(),
                        });
                    }
                    req.satisfied = true;
                    // A differently named implementation cannot fill the
                    // interface slot itself; forward through a proxy.
                    if !member.name.eq_ignore_ascii_case(&req.name) {
                        proxies.push(ProxyMethod {
                            interface: req.origin,
                            name: req.name.clone(),
                            signature: req.signature.clone(),
                            forwards_to: member_id,
                        });
                    }
                }
            }
        }

        // Implicit satisfaction by name and signature.
        for req in &mut self.required {
            if !req.satisfied
                && req.name.eq_ignore_ascii_case(&member.name)
                && req.signature.matches(signature)
            {
                req.satisfied = true;
            }
        }
        Ok(proxies)
    }

    /// Closes the tracker: sweeps the base class for matches that still
    /// satisfy open interface entries (via proxies), then reports every
    /// remaining entry. Returns the proxies to synthesize.
    pub fn finish(
        mut self,
        registry: &TypeRegistry,
        location: Location,
        diagnostics: &mut Diagnostics,
    ) -> Vec<ProxyMethod> {
        let mut proxies = Vec::new();
        let type_name = registry.descriptor(self.ty).full_name.clone();

        for req in &mut self.required {
            if req.satisfied || req.kind != RequirementKind::Interface {
                continue;
            }
            if let Some(found) = find_in_base(registry, self.ty, &req.name, &req.signature) {
                req.satisfied = true;
                proxies.push(ProxyMethod {
                    interface: req.origin,
                    name: req.name.clone(),
                    signature: req.signature.clone(),
                    forwards_to: found,
                });
            }
        }

        for req in &self.required {
            if req.satisfied {
                continue;
            }
            let origin = registry.descriptor(req.origin).full_name.clone();
            match req.kind {
                RequirementKind::Interface => diagnostics.error(
                    codes::INTERFACE_MEMBER_NOT_IMPLEMENTED,
                    location,
                    format!(
                        "'{type_name}' must implement '{}.{}'",
                        origin, req.name
                    ),
                ),
                RequirementKind::Abstract => diagnostics.error(
                    codes::ABSTRACT_MEMBER_NOT_IMPLEMENTED,
                    location,
                    format!(
                        "'{type_name}' must override '{}.{}'",
                        origin, req.name
                    ),
                ),
            }
        }
        proxies
    }
}

/// Searches the base chain for an accessible concrete method that can
/// stand in for an interface requirement. A same-name match is
/// preferred; failing that, any accessible method with the required
/// signature is accepted — the proxy carries the interface's name, so
/// the forwarded-to member's own name does not matter.
fn find_in_base(
    registry: &TypeRegistry,
    ty: TypeId,
    name: &str,
    signature: &MethodSignature,
) -> Option<MemberId> {
    let mut fallback = None;
    for ancestor in registry.base_chain_inclusive(ty).into_iter().skip(1) {
        for &member_id in &registry.descriptor(ancestor).members {
            let member = registry.member(member_id);
            if member.modifiers.is_private() {
                continue;
            }
            if !matches!(member.kind, MemberKind::Method { .. }) {
                continue;
            }
            let Some(member_signature) = member.signature() else {
                continue;
            };
            if !member_signature.matches(signature) {
                continue;
            }
            if member.name.eq_ignore_ascii_case(name) {
                return Some(member_id);
            }
            if fallback.is_none() {
                fallback = Some(member_id);
            }
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Modifiers;
    use crate::semantic_analysis::types::{
        MemberDescriptor, ParameterSig, PrimitiveKind, TypeDescriptor, TypeKind, TypeState,
    };

    struct Fixture {
        registry: TypeRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: TypeRegistry::new(),
            }
        }

        fn add_type(&mut self, name: &str, kind: TypeKind, base: Option<TypeId>) -> TypeId {
            let base = base.or_else(|| {
                matches!(kind, TypeKind::Class).then(|| self.registry.object())
            });
            self.registry
                .register(
                    "",
                    TypeDescriptor {
                        full_name: name.into(),
                        simple_name: name.into(),
                        kind,
                        base,
                        interfaces: Vec::new(),
                        members: Vec::new(),
                        modifiers: Modifiers::PUBLIC,
                        state: TypeState::Defined,
                    },
                )
                .unwrap()
        }

        fn signature(&self, parameter_count: usize) -> MethodSignature {
            let double = self.registry.primitive(PrimitiveKind::Double);
            MethodSignature {
                parameters: (0..parameter_count)
                    .map(|i| ParameterSig {
                        name: format!("p{i}").into(),
                        ty: double,
                        modifiers: Modifiers::BY_VAL,
                        default: None,
                    })
                    .collect(),
                return_type: None,
            }
        }

        fn add_method(
            &mut self,
            ty: TypeId,
            name: &str,
            signature: MethodSignature,
            modifiers: Modifiers,
        ) -> MemberId {
            self.registry.add_member(MemberDescriptor {
                name: name.into(),
                declaring_type: ty,
                modifiers,
                kind: MemberKind::Method { signature },
            })
        }
    }

    #[test]
    fn interface_method_satisfied_by_own_member() {
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let class = f.add_type("Reverb", TypeKind::Class, None);
        f.registry.descriptor_mut(class).interfaces = vec![iface];
        let own = f.add_method(class, "Process", sig, Modifiers::PUBLIC);

        let mut pending = PendingImplementations::gather(&f.registry, class);
        assert_eq!(pending.open_count(), 1);
        let proxies = pending.satisfy_member(&f.registry, own, &[]).unwrap();
        assert!(proxies.is_empty());
        assert_eq!(pending.open_count(), 0);

        let mut diagnostics = Diagnostics::new();
        let proxies = pending.finish(&f.registry, Location::NULL, &mut diagnostics);
        assert!(proxies.is_empty());
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn explicit_implementation_with_different_name_synthesizes_proxy() {
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let class = f.add_type("Reverb", TypeKind::Class, None);
        f.registry.descriptor_mut(class).interfaces = vec![iface];
        let own = f.add_method(class, "ApplyWet", sig, Modifiers::PUBLIC);

        let mut pending = PendingImplementations::gather(&f.registry, class);
        let proxies = pending
            .satisfy_member(&f.registry, own, &[(iface, "Process".into())])
            .unwrap();
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].name, "Process");
        assert_eq!(proxies[0].forwards_to, own);
        assert_eq!(pending.open_count(), 0);
    }

    #[test]
    fn inherited_concrete_method_satisfies_via_proxy() {
        // The base class provides a compatible concrete method under
        // another name; the interface requirement is met by forwarding.
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let base = f.add_type("Effect", TypeKind::Class, None);
        let inherited = f.add_method(base, "Render", sig, Modifiers::PUBLIC);

        let class = f.add_type("Reverb", TypeKind::Class, Some(base));
        f.registry.descriptor_mut(class).interfaces = vec![iface];

        let pending = PendingImplementations::gather(&f.registry, class);
        let mut diagnostics = Diagnostics::new();
        let proxies = pending.finish(&f.registry, Location::NULL, &mut diagnostics);
        assert!(!diagnostics.has_errors());
        assert_eq!(proxies.len(), 1);
        assert_eq!(proxies[0].forwards_to, inherited);
        assert_eq!(proxies[0].name, "Process");
    }

    #[test]
    fn private_base_members_are_not_eligible() {
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let base = f.add_type("Effect", TypeKind::Class, None);
        f.add_method(base, "Process", sig, Modifiers::PRIVATE);

        let class = f.add_type("Reverb", TypeKind::Class, Some(base));
        f.registry.descriptor_mut(class).interfaces = vec![iface];

        let pending = PendingImplementations::gather(&f.registry, class);
        let mut diagnostics = Diagnostics::new();
        let proxies = pending.finish(&f.registry, Location::NULL, &mut diagnostics);
        assert!(proxies.is_empty());
        assert!(diagnostics.has_code(codes::INTERFACE_MEMBER_NOT_IMPLEMENTED));
    }

    #[test]
    fn unimplemented_abstract_member_has_no_proxy_path() {
        let mut f = Fixture::new();
        let base = f.add_type("Effect", TypeKind::Class, None);
        let sig = f.signature(1);
        f.add_method(
            base,
            "Process",
            sig.clone(),
            Modifiers::PUBLIC.union(Modifiers::MUST_OVERRIDE),
        );
        // A sibling base method with the same signature exists, but
        // abstract requirements are never satisfied by forwarding.
        f.add_method(base, "Render", sig, Modifiers::PUBLIC);

        let class = f.add_type("Reverb", TypeKind::Class, Some(base));
        let pending = PendingImplementations::gather(&f.registry, class);
        let mut diagnostics = Diagnostics::new();
        let proxies = pending.finish(&f.registry, Location::NULL, &mut diagnostics);
        assert!(proxies.is_empty());
        assert!(diagnostics.has_code(codes::ABSTRACT_MEMBER_NOT_IMPLEMENTED));
    }

    #[test]
    fn first_override_wins_when_flattening_the_chain() {
        // Grandparent declares MustOverride Process; parent overrides it
        // concretely. The grandchild owes nothing.
        let mut f = Fixture::new();
        let sig = f.signature(1);
        let grand = f.add_type("EffectBase", TypeKind::Class, None);
        f.add_method(
            grand,
            "Process",
            sig.clone(),
            Modifiers::PUBLIC.union(Modifiers::MUST_OVERRIDE),
        );
        let parent = f.add_type("Effect", TypeKind::Class, Some(grand));
        f.add_method(
            parent,
            "Process",
            sig,
            Modifiers::PUBLIC.union(Modifiers::OVERRIDES),
        );
        let child = f.add_type("Reverb", TypeKind::Class, Some(parent));

        let pending = PendingImplementations::gather(&f.registry, child);
        assert_eq!(pending.open_count(), 0);
    }

    #[test]
    fn only_directly_listed_interfaces_are_gathered() {
        // Base lists the interface; the derived type does not list it
        // directly, so the derived type owes nothing for it.
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let base = f.add_type("Effect", TypeKind::Class, None);
        f.registry.descriptor_mut(base).interfaces = vec![iface];
        f.add_method(base, "Process", sig, Modifiers::PUBLIC);

        let derived = f.add_type("Reverb", TypeKind::Class, Some(base));
        let pending = PendingImplementations::gather(&f.registry, derived);
        assert_eq!(pending.open_count(), 0);
    }

    #[test]
    fn double_satisfaction_is_an_internal_inconsistency() {
        let mut f = Fixture::new();
        let iface = f.add_type("IProcessor", TypeKind::Interface, None);
        let sig = f.signature(1);
        f.add_method(iface, "Process", sig.clone(), Modifiers::PUBLIC);

        let class = f.add_type("Reverb", TypeKind::Class, None);
        f.registry.descriptor_mut(class).interfaces = vec![iface];
        let own = f.add_method(class, "DoIt", sig, Modifiers::PUBLIC);

        let mut pending = PendingImplementations::gather(&f.registry, class);
        let implements = [(iface, EcoString::from("Process"))];
        pending
            .satisfy_member(&f.registry, own, &implements)
            .unwrap();
        let result = pending.satisfy_member(&f.registry, own, &implements);
        assert!(result.is_err());
    }
}
