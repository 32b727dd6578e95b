//! Type registry and value layout
//!
//! Every type has exactly one canonical instance per structural key, so two
//! types are equal when their [`TypeId`]s are equal. The registry also
//! derives how many stack slots a value of each type occupies.

use bytecode_system::Word;
use core_types::SourcePosition;
use parser::{FieldType, TypeExpr, TypeExprKind};
use std::collections::HashMap;

/// Handle of a canonical type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);

impl TypeId {
    /// Position in the registry
    pub fn index(self) -> usize {
        self.0
    }

    /// Id stored in the discriminant slot of a variant value
    pub fn global_id(self) -> Word {
        self.0 as Word + 1
    }
}

/// Placeholder return type fixed by the first `return`
pub const INFER: TypeId = TypeId(0);
/// Generic parameter marker
pub const ANY: TypeId = TypeId(1);
/// 64-bit integer
pub const INTEGER: TypeId = TypeId(2);
/// 64-bit float stored as its bit pattern
pub const REAL: TypeId = TypeId(3);
/// `true` or `false`
pub const BOOLEAN: TypeId = TypeId(4);
/// Heap string
pub const TEXT: TypeId = TypeId(5);
/// Character code, an alias of integer
pub const CHAR: TypeId = TypeId(6);
/// Reified handler of a protected block
pub const EXCEPTION_HANDLER: TypeId = TypeId(7);
/// Zero-slot type of `null`
pub const NULL: TypeId = TypeId(8);

/// A field of a record type with its slot offset inside the blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordField {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: TypeId,
    /// First slot of the field
    pub offset: usize,
}

/// Shape of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// Built-in scalar or handle type
    BuiltIn(String),
    /// A declared name for another type
    Named {
        /// Declared name
        name: String,
        /// Aliased type
        underlying: TypeId,
    },
    /// Heap record, fields in declaration order
    Record(Vec<RecordField>),
    /// Unboxed tuple, items laid out one after the other
    Tuple(Vec<TypeId>),
    /// Tagged union, members sorted by key
    Variant(Vec<TypeId>),
    /// Heap array
    Array(TypeId),
    /// Generator result
    Sequence(TypeId),
    /// `null`
    Null,
}

/// A canonical type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    /// Shape
    pub kind: TypeKind,
    /// Structural key, unique in the registry
    pub key: String,
    /// Stack slots of a value
    pub slot_count: usize,
    /// Whether a single-slot value is a heap handle
    pub is_ref: bool,
}

/// Intern table of every type known to a compilation
///
/// # Examples
///
/// ```
/// use compiler::types::{TypeRegistry, INTEGER, TEXT};
///
/// let mut registry = TypeRegistry::new();
/// let (pair, created) = registry.tuple(vec![INTEGER, TEXT]);
/// assert!(created);
/// assert_eq!(registry.key(pair), "(integer,text)");
/// assert_eq!(registry.tuple(vec![INTEGER, TEXT]), (pair, false));
/// assert_eq!(registry.slot_count(pair), 2);
/// ```
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    types: Vec<Type>,
    by_key: HashMap<String, TypeId>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            by_key: HashMap::new(),
        };
        for (name, is_ref) in [
            ("_infer", false),
            ("any", false),
            ("integer", false),
            ("real", false),
            ("boolean", false),
            ("text", true),
        ] {
            registry.insert(TypeKind::BuiltIn(name.to_string()), name.to_string(), 1, is_ref);
        }
        registry.named("char", INTEGER);
        registry.insert(
            TypeKind::BuiltIn("_exception_handler".to_string()),
            "_exception_handler".to_string(),
            1,
            true,
        );
        registry.insert(TypeKind::Null, "null".to_string(), 0, false);
        registry
    }

    fn insert(&mut self, kind: TypeKind, key: String, slot_count: usize, is_ref: bool) -> TypeId {
        let id = TypeId(self.types.len());
        self.by_key.insert(key.clone(), id);
        self.types.push(Type {
            kind,
            key,
            slot_count,
            is_ref,
        });
        id
    }

    fn intern(&mut self, kind: TypeKind, key: String) -> (TypeId, bool) {
        if let Some(id) = self.by_key.get(&key) {
            return (*id, false);
        }
        let (slot_count, is_ref) = match &kind {
            TypeKind::BuiltIn(_) => (1, false),
            TypeKind::Named { underlying, .. } => {
                (self.slot_count(*underlying), self.is_ref(*underlying))
            }
            TypeKind::Record(_) | TypeKind::Array(_) | TypeKind::Sequence(_) => (1, true),
            TypeKind::Tuple(items) => (items.iter().map(|t| self.slot_count(*t)).sum(), false),
            TypeKind::Variant(members) => {
                let widest = members.iter().map(|t| self.slot_count(*t)).max().unwrap_or(0);
                (1 + widest, true)
            }
            TypeKind::Null => (0, false),
        };
        (self.insert(kind, key, slot_count, is_ref), true)
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether the registry is empty, never true after `new`
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type behind a handle
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0]
    }

    /// Structural key of a type
    pub fn key(&self, id: TypeId) -> &str {
        &self.types[id.0].key
    }

    /// Stack slots of a value of this type
    pub fn slot_count(&self, id: TypeId) -> usize {
        self.types[id.0].slot_count
    }

    /// Whether values of this type are heap handles
    pub fn is_ref(&self, id: TypeId) -> bool {
        self.types[id.0].is_ref
    }

    /// Find a built-in or declared type by name
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_key.get(name).copied().filter(|id| {
            matches!(
                self.types[id.0].kind,
                TypeKind::BuiltIn(_) | TypeKind::Named { .. }
            )
        })
    }

    /// Follow named aliases down to the structural type
    pub fn structural(&self, mut id: TypeId) -> TypeId {
        while let TypeKind::Named { underlying, .. } = self.types[id.0].kind {
            id = underlying;
        }
        id
    }

    /// Whether two types have the same structure once aliases are removed
    pub fn structurally_equal(&self, a: TypeId, b: TypeId) -> bool {
        self.structural(a) == self.structural(b)
    }

    /// Item type when `id` is an array
    pub fn array_item(&self, id: TypeId) -> Option<TypeId> {
        match self.types[self.structural(id).0].kind {
            TypeKind::Array(item) => Some(item),
            _ => None,
        }
    }

    /// Item type when `id` is a sequence
    pub fn sequence_item(&self, id: TypeId) -> Option<TypeId> {
        match self.types[self.structural(id).0].kind {
            TypeKind::Sequence(item) => Some(item),
            _ => None,
        }
    }

    /// Fields when `id` is a record
    pub fn record_fields(&self, id: TypeId) -> Option<&[RecordField]> {
        match &self.types[self.structural(id).0].kind {
            TypeKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Items when `id` is a tuple
    pub fn tuple_items(&self, id: TypeId) -> Option<&[TypeId]> {
        match &self.types[self.structural(id).0].kind {
            TypeKind::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Members when `id` is a variant
    pub fn variant_members(&self, id: TypeId) -> Option<&[TypeId]> {
        match &self.types[self.structural(id).0].kind {
            TypeKind::Variant(members) => Some(members),
            _ => None,
        }
    }

    /// Whether a value of type `ty` fits in `variant`
    ///
    /// A variant fits when each of its own members does.
    pub fn contains(&self, variant: TypeId, ty: TypeId) -> bool {
        let Some(members) = self.variant_members(variant) else {
            return false;
        };
        match self.variant_members(ty) {
            Some(inner) => inner.iter().all(|m| members.contains(m)),
            None => members.contains(&ty),
        }
    }

    /// Register a name for `underlying`
    pub fn named(&mut self, name: &str, underlying: TypeId) -> (TypeId, bool) {
        self.intern(
            TypeKind::Named {
                name: name.to_string(),
                underlying,
            },
            name.to_string(),
        )
    }

    /// Intern a record type, field offsets follow declaration order
    pub fn record(&mut self, fields: Vec<(String, TypeId)>) -> (TypeId, bool) {
        let key = format!(
            "{{{}}}",
            fields
                .iter()
                .map(|(name, ty)| format!("{} {}", name, self.key(*ty)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut offset = 0;
        let fields = fields
            .into_iter()
            .map(|(name, ty)| {
                let field = RecordField { name, ty, offset };
                offset += self.slot_count(ty);
                field
            })
            .collect();
        self.intern(TypeKind::Record(fields), key)
    }

    /// Total slots of the fields of a record
    pub fn field_slot_count(&self, id: TypeId) -> usize {
        self.record_fields(id)
            .map(|fields| fields.iter().map(|f| self.slot_count(f.ty)).sum())
            .unwrap_or(0)
    }

    /// Intern a tuple type
    pub fn tuple(&mut self, items: Vec<TypeId>) -> (TypeId, bool) {
        let key = format!(
            "({})",
            items
                .iter()
                .map(|t| self.key(*t))
                .collect::<Vec<_>>()
                .join(",")
        );
        self.intern(TypeKind::Tuple(items), key)
    }

    /// Intern a variant type, members are sorted by key
    pub fn variant(&mut self, mut members: Vec<TypeId>) -> (TypeId, bool) {
        members.sort_by(|a, b| self.key(*a).cmp(self.key(*b)));
        let key = members
            .iter()
            .map(|t| self.key(*t))
            .collect::<Vec<_>>()
            .join("|");
        self.intern(TypeKind::Variant(members), key)
    }

    /// Intern an array type
    pub fn array(&mut self, item: TypeId) -> (TypeId, bool) {
        let key = format!("[{}]", self.key(item));
        self.intern(TypeKind::Array(item), key)
    }

    /// Intern a sequence type
    pub fn sequence(&mut self, item: TypeId) -> (TypeId, bool) {
        let key = format!("sequence({})", self.key(item));
        self.intern(TypeKind::Sequence(item), key)
    }

    /// Rebuild a type expression that resolves back to `id`
    pub fn to_type_expr(&self, id: TypeId, position: SourcePosition) -> TypeExpr {
        let kind = match &self.types[id.0].kind {
            TypeKind::BuiltIn(name) | TypeKind::Named { name, .. } => {
                TypeExprKind::Named(name.clone())
            }
            TypeKind::Record(fields) => TypeExprKind::Record(
                fields
                    .iter()
                    .map(|f| FieldType {
                        name: f.name.clone(),
                        ty: self.to_type_expr(f.ty, position),
                        position,
                    })
                    .collect(),
            ),
            TypeKind::Tuple(items) => TypeExprKind::Tuple(
                items.iter().map(|t| self.to_type_expr(*t, position)).collect(),
            ),
            TypeKind::Variant(members) => TypeExprKind::Variant(
                members.iter().map(|t| self.to_type_expr(*t, position)).collect(),
            ),
            TypeKind::Array(item) => TypeExprKind::Array(Box::new(self.to_type_expr(*item, position))),
            TypeKind::Sequence(item) => {
                TypeExprKind::Sequence(Box::new(self.to_type_expr(*item, position)))
            }
            TypeKind::Null => TypeExprKind::Null,
        };
        TypeExpr::new(kind, position)
    }
}
