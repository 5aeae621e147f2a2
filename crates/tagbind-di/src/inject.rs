//! Field injection
//!
//! A type declares its injectable fields once through [`Injectable`],
//! producing an [`InjectionPlan`]: an ordered list of field descriptors,
//! each with a requirement (structural search or scope injection) and an
//! accessor that writes the resolved value. The [`Injector`] caches plans
//! per type and applies them to a target on behalf of an owning object.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tagbind_common::{CapabilityId, Tag};
use tracing::{debug, error};

use crate::chain::ResolutionChain;
use crate::host::{Host, ObjectId, SearchMode, StructuralQuery};
use crate::instance::Instance;
use crate::registry::ScopeRegistry;
use crate::{DiError, DiResult};

/// Locate the value in the host object hierarchy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralRequirement {
    pub mode: SearchMode,
    pub tag: Tag,
    pub include_inactive: bool,
}

impl StructuralRequirement {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            tag: Tag::NONE,
            include_inactive: false,
        }
    }

    pub fn on_self() -> Self {
        Self::new(SearchMode::OnSelf)
    }

    pub fn children() -> Self {
        Self::new(SearchMode::Children)
    }

    pub fn parent() -> Self {
        Self::new(SearchMode::Parent)
    }

    pub fn in_active_group() -> Self {
        Self::new(SearchMode::InActiveGroup)
    }

    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    fn query(&self, capability: CapabilityId) -> StructuralQuery {
        StructuralQuery::new(self.mode, capability)
            .tagged(self.tag.clone())
            .include_inactive(self.include_inactive)
    }
}

/// Resolve the value through the scope chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectRequirement {
    pub tag: Tag,
    /// Optional fields use cache lookups only and may stay unset
    pub optional: bool,
}

impl InjectRequirement {
    pub fn required() -> Self {
        Self {
            tag: Tag::NONE,
            optional: false,
        }
    }

    pub fn optional() -> Self {
        Self {
            tag: Tag::NONE,
            optional: true,
        }
    }

    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = tag.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Structural(StructuralRequirement),
    Inject(InjectRequirement),
}

type AssignOne<T> = Box<dyn Fn(&mut T, Option<Instance>) -> DiResult<()>>;
type AssignMany<T> = Box<dyn Fn(&mut T, Vec<Instance>) -> DiResult<()>>;

enum Slot<T> {
    One(AssignOne<T>),
    Many(AssignMany<T>),
}

/// One injectable field of `T`
pub struct FieldDescriptor<T> {
    declaring_type: &'static str,
    name: &'static str,
    capability: CapabilityId,
    requirement: Requirement,
    slot: Slot<T>,
}

impl<T> FieldDescriptor<T> {
    /// Type that declares the field; differs from `T` for included fields
    pub fn declaring_type(&self) -> &'static str {
        self.declaring_type
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capability(&self) -> CapabilityId {
        self.capability
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Collects every match instead of the first
    pub fn is_collection(&self) -> bool {
        matches!(self.slot, Slot::Many(_))
    }
}

fn view_of<I: ?Sized + 'static>(instance: &Instance) -> DiResult<Rc<I>> {
    instance
        .view::<I>()
        .ok_or_else(|| DiError::mismatch(CapabilityId::of::<I>(), instance))
}

/// Ordered injectable fields of `T`
pub struct InjectionPlan<T> {
    fields: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> InjectionPlan<T> {
    pub fn builder() -> InjectionPlanBuilder<T> {
        InjectionPlanBuilder { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct InjectionPlanBuilder<T> {
    fields: Vec<FieldDescriptor<T>>,
}

impl<T: 'static> InjectionPlanBuilder<T> {
    fn declaring_type() -> &'static str {
        CapabilityId::of::<T>().short_name()
    }

    /// Field resolved through the scope chain
    pub fn inject<I: ?Sized + 'static>(
        mut self,
        name: &'static str,
        requirement: InjectRequirement,
        field: fn(&mut T) -> &mut Option<Rc<I>>,
    ) -> Self {
        let assign: AssignOne<T> = Box::new(move |target: &mut T, value: Option<Instance>| {
            if let Some(instance) = value {
                *field(target) = Some(view_of::<I>(&instance)?);
            }
            Ok(())
        });
        self.fields.push(FieldDescriptor {
            declaring_type: Self::declaring_type(),
            name,
            capability: CapabilityId::of::<I>(),
            requirement: Requirement::Inject(requirement),
            slot: Slot::One(assign),
        });
        self
    }

    /// Scalar field set to the first structural match, or cleared
    pub fn structural<I: ?Sized + 'static>(
        mut self,
        name: &'static str,
        requirement: StructuralRequirement,
        field: fn(&mut T) -> &mut Option<Rc<I>>,
    ) -> Self {
        let assign: AssignOne<T> = Box::new(move |target: &mut T, value: Option<Instance>| {
            *field(target) = value.as_ref().map(view_of::<I>).transpose()?;
            Ok(())
        });
        self.fields.push(FieldDescriptor {
            declaring_type: Self::declaring_type(),
            name,
            capability: CapabilityId::of::<I>(),
            requirement: Requirement::Structural(requirement),
            slot: Slot::One(assign),
        });
        self
    }

    /// Collection field set to every structural match
    pub fn structural_all<I: ?Sized + 'static>(
        mut self,
        name: &'static str,
        requirement: StructuralRequirement,
        field: fn(&mut T) -> &mut Vec<Rc<I>>,
    ) -> Self {
        let assign: AssignMany<T> = Box::new(move |target: &mut T, values: Vec<Instance>| {
            *field(target) = values
                .iter()
                .map(view_of::<I>)
                .collect::<DiResult<Vec<_>>>()?;
            Ok(())
        });
        self.fields.push(FieldDescriptor {
            declaring_type: Self::declaring_type(),
            name,
            capability: CapabilityId::of::<I>(),
            requirement: Requirement::Structural(requirement),
            slot: Slot::Many(assign),
        });
        self
    }

    /// Append the fields of an embedded base part
    pub fn include<B: Injectable>(mut self, base: fn(&mut T) -> &mut B) -> Self {
        for field in B::injection_plan().fields {
            let slot = match field.slot {
                Slot::One(assign) => Slot::One(Box::new(
                    move |target: &mut T, value: Option<Instance>| assign(base(target), value),
                ) as AssignOne<T>),
                Slot::Many(assign) => Slot::Many(Box::new(
                    move |target: &mut T, values: Vec<Instance>| assign(base(target), values),
                ) as AssignMany<T>),
            };
            self.fields.push(FieldDescriptor {
                declaring_type: field.declaring_type,
                name: field.name,
                capability: field.capability,
                requirement: field.requirement,
                slot,
            });
        }
        self
    }

    pub fn build(self) -> InjectionPlan<T> {
        InjectionPlan {
            fields: self.fields,
        }
    }
}

/// Types whose fields the [`Injector`] can fill
pub trait Injectable: Sized + 'static {
    fn injection_plan() -> InjectionPlan<Self>;
}

/// A required field nothing in the chain could satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsatisfiedField {
    pub declaring_type: &'static str,
    pub field: &'static str,
    pub capability: CapabilityId,
    pub tag: Tag,
    pub owner: ObjectId,
}

/// Outcome of one injection pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionReport {
    /// Fields that received a value
    pub resolved: usize,
    pub unsatisfied: Vec<UnsatisfiedField>,
}

impl InjectionReport {
    pub fn is_complete(&self) -> bool {
        self.unsatisfied.is_empty()
    }
}

pub struct Injector {
    host: Rc<dyn Host>,
    registry: Rc<ScopeRegistry>,
    plans: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl Injector {
    pub fn new(host: Rc<dyn Host>, registry: Rc<ScopeRegistry>) -> Self {
        Self {
            host,
            registry,
            plans: RefCell::new(HashMap::new()),
        }
    }

    /// Plan for `T`, built on first use
    pub fn plan<T: Injectable>(&self) -> Rc<InjectionPlan<T>> {
        let cached = self.plans.borrow().get(&TypeId::of::<T>()).cloned();
        if let Some(plan) = cached.and_then(|plan| plan.downcast::<InjectionPlan<T>>().ok()) {
            return plan;
        }

        let plan = Rc::new(T::injection_plan());
        debug!(
            target_type = %CapabilityId::of::<T>().short_name(),
            fields = plan.len(),
            "Cached injection plan"
        );
        self.plans
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::clone(&plan) as Rc<dyn Any>);
        plan
    }

    pub fn resolution_chain(&self, owner: ObjectId) -> ResolutionChain {
        ResolutionChain::build(&self.registry, &*self.host, owner)
    }

    /// Fill every declared field of `target` on behalf of `owner`
    ///
    /// Structural fields are searched from `owner`; injected fields go
    /// through the owner's resolution chain. Required fields nothing could
    /// satisfy are left untouched and listed in the report.
    pub fn initialize<T: Injectable>(&self, owner: ObjectId, target: &mut T) -> DiResult<InjectionReport> {
        let plan = self.plan::<T>();
        let chain = self.resolution_chain(owner);
        let mut report = InjectionReport::default();

        for field in plan.fields() {
            match &field.requirement {
                Requirement::Structural(requirement) => {
                    let query = requirement.query(field.capability);
                    match &field.slot {
                        Slot::One(assign) => {
                            let found = self.host.find_first(owner, &query);
                            if found.is_some() {
                                report.resolved += 1;
                            }
                            assign(target, found)?;
                        }
                        Slot::Many(assign) => {
                            let found = self.host.find_all(owner, &query);
                            if !found.is_empty() {
                                report.resolved += 1;
                            }
                            assign(target, found)?;
                        }
                    }
                }
                Requirement::Inject(requirement) => {
                    self.inject_field(owner, &chain, field, requirement, target, &mut report)?;
                }
            }
        }

        debug!(
            owner = %self.host.describe(owner),
            resolved = report.resolved,
            unsatisfied = report.unsatisfied.len(),
            "Initialized target"
        );
        Ok(report)
    }

    /// Fill only the injected fields, logging every unsatisfied required one
    pub fn inject_field_bindings<T: Injectable>(
        &self,
        owner: ObjectId,
        target: &mut T,
    ) -> DiResult<InjectionReport> {
        let plan = self.plan::<T>();
        let chain = self.resolution_chain(owner);
        let mut report = InjectionReport::default();

        for field in plan.fields() {
            if let Requirement::Inject(requirement) = &field.requirement {
                self.inject_field(owner, &chain, field, requirement, target, &mut report)?;
            }
        }

        for missing in &report.unsatisfied {
            error!(
                field = %format!("{}.{}", missing.declaring_type, missing.field),
                capability = %missing.capability,
                tag = %missing.tag,
                owner = %self.host.describe(missing.owner),
                "Failed to inject required field `{}.{}` on `{}`: no binding found in owner, group or process scope",
                missing.declaring_type,
                missing.field,
                self.host.describe(missing.owner)
            );
        }
        Ok(report)
    }

    fn inject_field<T>(
        &self,
        owner: ObjectId,
        chain: &ResolutionChain,
        field: &FieldDescriptor<T>,
        requirement: &InjectRequirement,
        target: &mut T,
        report: &mut InjectionReport,
    ) -> DiResult<()> {
        match chain.resolve(field.capability, &requirement.tag, requirement.optional) {
            Some(instance) => {
                match &field.slot {
                    Slot::One(assign) => assign(target, Some(instance))?,
                    Slot::Many(assign) => assign(target, vec![instance])?,
                }
                report.resolved += 1;
            }
            None if !requirement.optional => report.unsatisfied.push(UnsatisfiedField {
                declaring_type: field.declaring_type,
                field: field.name,
                capability: field.capability,
                tag: requirement.tag.clone(),
                owner,
            }),
            None => {}
        }
        Ok(())
    }
}
