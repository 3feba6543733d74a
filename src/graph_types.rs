//! Resolvers for every object type of the subgraph.
//!
//! Each type implements [`ObjectType`]: identity without I/O
//! (`resolve_id`), scalar columns through the request loader
//! (`resolve_fields`) and links to other objects (`resolve_edge`).

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::collection::{resolve_association, resolve_collection};
use crate::context::RequestContext;
use crate::envelope::{MutationEnvelope, MutationResult, MutationStatus};
use crate::error::ResolveError;
use crate::inputs::{
    AuthorInsert, AuthorUpdate, AuthorWhere, InsertInput, PublicationCategoryInsert,
    PublicationCategoryUpdate, PublicationCategoryWhere, PublicationInsert, PublicationTypeInsert,
    PublicationTypeUpdate, PublicationTypeWhere, PublicationUpdate, PublicationWhere,
    SubjectLinkInsert, UpdateInput, WhereInput,
};
use crate::model::{
    Author, Entity, Publication, PublicationCategory, PublicationType, Record, SubjectLink,
    record_id,
};
use crate::permission::Action;
use crate::reference::{Ref, Referent, Subject, User, resolve_reference};

pub type Args = Record;

/// A value the executor can select fields on.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub type_name: &'static str,
    pub id: Option<Uuid>,
    /// Fields already known without a storage round trip.
    pub payload: Record,
}

impl Object {
    pub fn entity(type_name: &'static str, id: Uuid) -> Self {
        Object {
            type_name,
            id: Some(id),
            payload: Record::new(),
        }
    }

    pub fn root(type_name: &'static str) -> Self {
        Object {
            type_name,
            id: None,
            payload: Record::new(),
        }
    }
}

/// Result of an edge, before sub-selection.
#[derive(Debug)]
pub enum Node {
    Null,
    Value(Value),
    Object(Object),
    List(Vec<Node>),
    /// A slot that failed on its own; rendered as `null` plus an error entry.
    Failed(ResolveError),
}

impl<E: Entity> From<Ref<E>> for Node {
    fn from(handle: Ref<E>) -> Self {
        Node::Object(Object::entity(E::TYPE_NAME, handle.id()))
    }
}

fn referent<F: Referent>(id: Option<Uuid>) -> Node {
    match id {
        Some(id) => Node::Object(Object::entity(F::TYPE_NAME, id)),
        None => Node::Null,
    }
}

fn list<E: Entity>(handles: Vec<Ref<E>>) -> Node {
    Node::List(handles.into_iter().map(Node::from).collect())
}

fn slots<F: Referent>(slots: Vec<Result<Uuid, ResolveError>>) -> Node {
    Node::List(
        slots
            .into_iter()
            .map(|slot| match slot {
                Ok(id) => Node::Object(Object::entity(F::TYPE_NAME, id)),
                Err(e) => Node::Failed(e),
            })
            .collect(),
    )
}

/// An edge field and the object type it leads to.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub name: &'static str,
    pub target: &'static str,
}

const fn edge(name: &'static str, target: &'static str) -> Edge {
    Edge { name, target }
}

#[async_trait]
pub trait ObjectType: Send + Sync {
    fn name(&self) -> &'static str;

    fn edges(&self) -> &'static [Edge];

    fn is_edge(&self, field: &str) -> bool {
        self.edges().iter().any(|edge| edge.name == field)
    }

    fn resolve_id(&self, object: &Object) -> Option<Uuid> {
        object.id
    }

    /// Scalar fields keyed by GraphQL field name.
    async fn resolve_fields(
        &self,
        _ctx: &Arc<RequestContext>,
        object: &Object,
    ) -> Result<Record, ResolveError> {
        Ok(object.payload.clone())
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        object: &Object,
        edge: &str,
        args: &Args,
    ) -> Result<Node, ResolveError>;
}

fn unknown_edge(type_name: &str, edge: &str) -> ResolveError {
    ResolveError::Internal(format!("{type_name} has no edge `{edge}`"))
}

fn object_id(object: &Object) -> Result<Uuid, ResolveError> {
    object
        .id
        .ok_or_else(|| ResolveError::Internal(format!("{} object without id", object.type_name)))
}

/// GraphQL name of a storage column.
pub fn field_name(column: &str) -> String {
    match column {
        "createdby" => "createdBy".to_string(),
        "changedby" => "changedBy".to_string(),
        _ => {
            let mut name = String::with_capacity(column.len());
            let mut upper = false;
            for c in column.chars() {
                if c == '_' {
                    upper = true;
                } else if upper {
                    name.extend(c.to_uppercase());
                    upper = false;
                } else {
                    name.push(c);
                }
            }
            name
        }
    }
}

fn graph_fields(record: Record) -> Record {
    record
        .into_iter()
        .map(|(column, value)| (field_name(&column), value))
        .collect()
}

pub fn argument<T: DeserializeOwned>(args: &Args, name: &str) -> Result<T, ResolveError> {
    let value = args.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value)
        .map_err(|e| ResolveError::Validation(format!("invalid argument `{name}`: {e}")))
}

/// Entity-specific edges; the shared parts live in [`EntityObject`].
#[async_trait]
pub trait GraphEntity: Entity {
    const EDGES: &'static [Edge];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        args: &Args,
    ) -> Result<Node, ResolveError>;
}

pub struct EntityObject<E>(PhantomData<fn() -> E>);

impl<E> EntityObject<E> {
    pub fn new() -> Self {
        EntityObject(PhantomData)
    }
}

impl<E> Default for EntityObject<E> {
    fn default() -> Self {
        EntityObject::new()
    }
}

#[async_trait]
impl<E: GraphEntity> ObjectType for EntityObject<E> {
    fn name(&self) -> &'static str {
        E::TYPE_NAME
    }

    fn edges(&self) -> &'static [Edge] {
        E::EDGES
    }

    async fn resolve_fields(
        &self,
        ctx: &Arc<RequestContext>,
        object: &Object,
    ) -> Result<Record, ResolveError> {
        let entity = resolve_reference::<E>(object_id(object)?).load(ctx).await?;
        Ok(graph_fields(entity.to_record()?))
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        object: &Object,
        edge: &str,
        args: &Args,
    ) -> Result<Node, ResolveError> {
        let this = resolve_reference::<E>(object_id(object)?);
        E::resolve_edge(ctx, this, edge, args).await
    }
}

#[async_trait]
impl GraphEntity for Publication {
    const EDGES: &'static [Edge] = &[
        edge("publicationtype", "PublicationType"),
        edge("authors", "PublicationAuthor"),
        edge("subjects", "Subject"),
    ];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "publicationtype" => {
                let publication = this.load(ctx).await?;
                Ok(publication
                    .publication_type_id
                    .map_or(Node::Null, |id| resolve_reference::<PublicationType>(id).into()))
            }
            "authors" => Ok(list(
                resolve_collection::<Author>(ctx, "publication_id", this.id()).await?,
            )),
            "subjects" => Ok(slots::<Subject>(
                resolve_association::<SubjectLink, Subject>(
                    ctx,
                    "publication_id",
                    "subject_id",
                    this.id(),
                )
                .await?,
            )),
            _ => Err(unknown_edge(<Self as Entity>::TYPE_NAME, edge)),
        }
    }
}

#[async_trait]
impl GraphEntity for PublicationType {
    const EDGES: &'static [Edge] = &[
        edge("category", "PublicationCategory"),
        edge("publications", "Publication"),
    ];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "category" => {
                let publication_type = this.load(ctx).await?;
                Ok(publication_type
                    .category_id
                    .map_or(Node::Null, |id| {
                        resolve_reference::<PublicationCategory>(id).into()
                    }))
            }
            "publications" => Ok(list(
                resolve_collection::<Publication>(ctx, "publication_type_id", this.id()).await?,
            )),
            _ => Err(unknown_edge(<Self as Entity>::TYPE_NAME, edge)),
        }
    }
}

#[async_trait]
impl GraphEntity for PublicationCategory {
    const EDGES: &'static [Edge] = &[edge("publicationTypes", "PublicationType")];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "publicationTypes" => Ok(list(
                resolve_collection::<PublicationType>(ctx, "category_id", this.id()).await?,
            )),
            _ => Err(unknown_edge(<Self as Entity>::TYPE_NAME, edge)),
        }
    }
}

#[async_trait]
impl GraphEntity for Author {
    const EDGES: &'static [Edge] = &[edge("user", "User"), edge("publication", "Publication")];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        let author = this.load(ctx).await?;
        match edge {
            "user" => Ok(referent::<User>(author.user_id)),
            "publication" => Ok(author
                .publication_id
                .map_or(Node::Null, |id| resolve_reference::<Publication>(id).into())),
            _ => Err(unknown_edge(<Self as Entity>::TYPE_NAME, edge)),
        }
    }
}

#[async_trait]
impl GraphEntity for SubjectLink {
    const EDGES: &'static [Edge] = &[
        edge("publication", "Publication"),
        edge("subject", "Subject"),
    ];

    async fn resolve_edge(
        ctx: &Arc<RequestContext>,
        this: Ref<Self>,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        let link = this.load(ctx).await?;
        match edge {
            "publication" => Ok(link
                .publication_id
                .map_or(Node::Null, |id| resolve_reference::<Publication>(id).into())),
            "subject" => Ok(referent::<Subject>(link.subject_id)),
            _ => Err(unknown_edge(<Self as Entity>::TYPE_NAME, edge)),
        }
    }
}

const USER_EDGES: &[Edge] = &[edge("authorPublications", "PublicationAuthor")];

const SUBJECT_EDGES: &[Edge] = &[edge("publications", "Publication")];

/// `User` is owned by the user service; this subgraph only adds edges.
pub struct UserObject;

#[async_trait]
impl ObjectType for UserObject {
    fn name(&self) -> &'static str {
        User::TYPE_NAME
    }

    fn edges(&self) -> &'static [Edge] {
        USER_EDGES
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        object: &Object,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "authorPublications" => Ok(list(
                resolve_collection::<Author>(ctx, "user_id", object_id(object)?).await?,
            )),
            _ => Err(unknown_edge(User::TYPE_NAME, edge)),
        }
    }
}

/// `Subject` is owned by another service; this subgraph adds `publications`.
pub struct SubjectObject;

#[async_trait]
impl ObjectType for SubjectObject {
    fn name(&self) -> &'static str {
        Subject::TYPE_NAME
    }

    fn edges(&self) -> &'static [Edge] {
        SUBJECT_EDGES
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        object: &Object,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "publications" => Ok(slots::<Publication>(
                resolve_association::<SubjectLink, Publication>(
                    ctx,
                    "subject_id",
                    "publication_id",
                    object_id(object)?,
                )
                .await?,
            )),
            _ => Err(unknown_edge(Subject::TYPE_NAME, edge)),
        }
    }
}

/// Types that `_entities` can resolve from a representation.
const ENTITY_TYPES: [&str; 7] = [
    <Publication as Entity>::TYPE_NAME,
    <PublicationType as Entity>::TYPE_NAME,
    <PublicationCategory as Entity>::TYPE_NAME,
    <Author as Entity>::TYPE_NAME,
    <SubjectLink as Entity>::TYPE_NAME,
    User::TYPE_NAME,
    Subject::TYPE_NAME,
];

#[derive(Deserialize)]
struct Representation {
    #[serde(rename = "__typename")]
    typename: String,
    id: Uuid,
}

const QUERY_EDGES: &[Edge] = &[
    edge("publicationById", "Publication"),
    edge("publicationPage", "Publication"),
    edge("publicationTypeById", "PublicationType"),
    edge("publicationTypePage", "PublicationType"),
    edge("publicationCategoryById", "PublicationCategory"),
    edge("publicationCategoryPage", "PublicationCategory"),
    edge("authorById", "PublicationAuthor"),
    edge("authorPage", "PublicationAuthor"),
    edge("_entities", "_Entity"),
    edge("_service", "_Service"),
];

pub struct QueryRoot {
    sdl: &'static str,
}

impl QueryRoot {
    pub fn new(sdl: &'static str) -> Self {
        QueryRoot { sdl }
    }
}

async fn by_id<E: Entity>(ctx: &RequestContext, args: &Args) -> Result<Node, ResolveError> {
    ctx.authorize(Action::Read, E::TYPE_NAME, None).await?;
    let id: Uuid = argument(args, "id")?;
    let handle = resolve_reference::<E>(id);
    Ok(match handle.load_optional(ctx).await? {
        Some(_) => handle.into(),
        None => Node::Null,
    })
}

async fn page<W>(ctx: &RequestContext, args: &Args) -> Result<Node, ResolveError>
where
    W: WhereInput + DeserializeOwned,
{
    let table = W::Target::TABLE;
    ctx.authorize(Action::Read, W::Target::TYPE_NAME, None).await?;

    let skip: Option<i64> = argument(args, "skip")?;
    let limit: Option<i64> = argument(args, "limit")?;
    let skip = usize::try_from(skip.unwrap_or(0))
        .map_err(|_| ResolveError::Validation("`skip` must not be negative".to_string()))?;
    let limit = usize::try_from(limit.unwrap_or(10))
        .map_err(|_| ResolveError::Validation("`limit` must not be negative".to_string()))?;
    let filter: Option<W> = argument(args, "where")?;
    let filter = filter.unwrap_or_default().into_filter()?.and("valid", true);

    let rows = ctx.loader(table).page(&filter, skip, limit).await?;
    Ok(Node::List(
        rows.iter()
            .filter_map(record_id)
            .map(|id| resolve_reference::<W::Target>(id).into())
            .collect(),
    ))
}

fn entities(args: &Args) -> Result<Node, ResolveError> {
    let representations: Vec<Value> = argument(args, "representations")?;
    Ok(Node::List(
        representations
            .into_iter()
            .map(|raw| {
                let representation: Representation = match serde_json::from_value(raw) {
                    Ok(representation) => representation,
                    Err(e) => {
                        return Node::Failed(ResolveError::Validation(format!(
                            "invalid representation: {e}"
                        )));
                    }
                };
                match ENTITY_TYPES
                    .iter()
                    .find(|name| **name == representation.typename)
                {
                    Some(type_name) => Node::Object(Object::entity(*type_name, representation.id)),
                    None => Node::Failed(ResolveError::Validation(format!(
                        "`{}` is not an entity of this subgraph",
                        representation.typename
                    ))),
                }
            })
            .collect(),
    ))
}

#[async_trait]
impl ObjectType for QueryRoot {
    fn name(&self) -> &'static str {
        "Query"
    }

    fn edges(&self) -> &'static [Edge] {
        QUERY_EDGES
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        _object: &Object,
        edge: &str,
        args: &Args,
    ) -> Result<Node, ResolveError> {
        match edge {
            "publicationById" => by_id::<Publication>(ctx, args).await,
            "publicationPage" => page::<PublicationWhere>(ctx, args).await,
            "publicationTypeById" => by_id::<PublicationType>(ctx, args).await,
            "publicationTypePage" => page::<PublicationTypeWhere>(ctx, args).await,
            "publicationCategoryById" => by_id::<PublicationCategory>(ctx, args).await,
            "publicationCategoryPage" => page::<PublicationCategoryWhere>(ctx, args).await,
            "authorById" => by_id::<Author>(ctx, args).await,
            "authorPage" => page::<AuthorWhere>(ctx, args).await,
            "_entities" => {
                ctx.authorize(Action::Read, "_Entity", None).await?;
                entities(args)
            }
            "_service" => {
                let mut payload = Record::new();
                payload.insert("sdl".to_string(), Value::String(self.sdl.to_string()));
                Ok(Node::Object(Object {
                    type_name: "_Service",
                    id: None,
                    payload,
                }))
            }
            _ => Err(unknown_edge("Query", edge)),
        }
    }
}

/// `_Service { sdl }` of the federation protocol.
pub struct ServiceObject;

#[async_trait]
impl ObjectType for ServiceObject {
    fn name(&self) -> &'static str {
        "_Service"
    }

    fn edges(&self) -> &'static [Edge] {
        &[]
    }

    async fn resolve_edge(
        &self,
        _ctx: &Arc<RequestContext>,
        _object: &Object,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        Err(unknown_edge("_Service", edge))
    }
}

fn result_node(result_type: &'static str, result: MutationResult) -> Node {
    let mut payload = Record::new();
    payload.insert(
        "id".to_string(),
        result
            .id
            .map_or(Value::Null, |id| Value::String(id.to_string())),
    );
    payload.insert("msg".to_string(), Value::String(result.msg().to_string()));
    payload.insert(
        "status".to_string(),
        Value::String(result.status.as_str().to_string()),
    );
    payload.insert(
        "detail".to_string(),
        result.detail.map_or(Value::Null, Value::String),
    );
    Node::Object(Object {
        type_name: result_type,
        id: result.id,
        payload,
    })
}

fn invalid_input(e: ResolveError) -> MutationResult {
    MutationResult::failed(None, MutationStatus::ValidationError, e.to_string())
}

async fn insert<I>(ctx: &RequestContext, args: &Args, arg: &str) -> MutationResult
where
    I: InsertInput + DeserializeOwned,
{
    match argument::<I>(args, arg) {
        Ok(input) => MutationEnvelope::<I::Target>::new(ctx).insert(input).await,
        Err(e) => invalid_input(e),
    }
}

async fn update<U>(ctx: &RequestContext, args: &Args, arg: &str) -> MutationResult
where
    U: UpdateInput + DeserializeOwned,
{
    match argument::<U>(args, arg) {
        Ok(input) => MutationEnvelope::<U::Target>::new(ctx).update(input).await,
        Err(e) => invalid_input(e),
    }
}

async fn delete<E: Entity>(ctx: &RequestContext, args: &Args) -> MutationResult {
    match argument::<Uuid>(args, "id") {
        Ok(id) => MutationEnvelope::<E>::new(ctx).delete(id).await,
        Err(e) => invalid_input(e),
    }
}

async fn purge<E: Entity>(ctx: &RequestContext, args: &Args) -> MutationResult {
    match argument::<Uuid>(args, "id") {
        Ok(id) => MutationEnvelope::<E>::new(ctx).purge(id).await,
        Err(e) => invalid_input(e),
    }
}

const MUTATION_EDGES: &[Edge] = &[
    edge("publicationInsert", "PublicationResult"),
    edge("publicationUpdate", "PublicationResult"),
    edge("publicationDelete", "PublicationResult"),
    edge("publicationPurge", "PublicationResult"),
    edge("publicationTypeInsert", "PublicationTypeResult"),
    edge("publicationTypeUpdate", "PublicationTypeResult"),
    edge("publicationTypeDelete", "PublicationTypeResult"),
    edge("publicationTypePurge", "PublicationTypeResult"),
    edge("publicationCategoryInsert", "PublicationCategoryResult"),
    edge("publicationCategoryUpdate", "PublicationCategoryResult"),
    edge("publicationCategoryDelete", "PublicationCategoryResult"),
    edge("publicationCategoryPurge", "PublicationCategoryResult"),
    edge("publicationAuthorInsert", "PublicationAuthorResult"),
    edge("publicationAuthorUpdate", "PublicationAuthorResult"),
    edge("publicationAuthorDelete", "PublicationAuthorResult"),
    edge("publicationAuthorPurge", "PublicationAuthorResult"),
    edge("publicationSubjectInsert", "PublicationSubjectResult"),
    edge("publicationSubjectDelete", "PublicationSubjectResult"),
    edge("publicationSubjectPurge", "PublicationSubjectResult"),
];

pub struct MutationRoot;

#[async_trait]
impl ObjectType for MutationRoot {
    fn name(&self) -> &'static str {
        "Mutation"
    }

    fn edges(&self) -> &'static [Edge] {
        MUTATION_EDGES
    }

    async fn resolve_edge(
        &self,
        ctx: &Arc<RequestContext>,
        _object: &Object,
        edge: &str,
        args: &Args,
    ) -> Result<Node, ResolveError> {
        let ctx: &RequestContext = ctx;
        let (result_type, result) = match edge {
            "publicationInsert" => (
                "PublicationResult",
                insert::<PublicationInsert>(ctx, args, "publication").await,
            ),
            "publicationUpdate" => (
                "PublicationResult",
                update::<PublicationUpdate>(ctx, args, "publication").await,
            ),
            "publicationDelete" => ("PublicationResult", delete::<Publication>(ctx, args).await),
            "publicationPurge" => ("PublicationResult", purge::<Publication>(ctx, args).await),
            "publicationTypeInsert" => (
                "PublicationTypeResult",
                insert::<PublicationTypeInsert>(ctx, args, "publicationType").await,
            ),
            "publicationTypeUpdate" => (
                "PublicationTypeResult",
                update::<PublicationTypeUpdate>(ctx, args, "publicationType").await,
            ),
            "publicationTypeDelete" => (
                "PublicationTypeResult",
                delete::<PublicationType>(ctx, args).await,
            ),
            "publicationTypePurge" => (
                "PublicationTypeResult",
                purge::<PublicationType>(ctx, args).await,
            ),
            "publicationCategoryInsert" => (
                "PublicationCategoryResult",
                insert::<PublicationCategoryInsert>(ctx, args, "publicationCategory").await,
            ),
            "publicationCategoryUpdate" => (
                "PublicationCategoryResult",
                update::<PublicationCategoryUpdate>(ctx, args, "publicationCategory").await,
            ),
            "publicationCategoryDelete" => (
                "PublicationCategoryResult",
                delete::<PublicationCategory>(ctx, args).await,
            ),
            "publicationCategoryPurge" => (
                "PublicationCategoryResult",
                purge::<PublicationCategory>(ctx, args).await,
            ),
            "publicationAuthorInsert" => (
                "PublicationAuthorResult",
                insert::<AuthorInsert>(ctx, args, "author").await,
            ),
            "publicationAuthorUpdate" => (
                "PublicationAuthorResult",
                update::<AuthorUpdate>(ctx, args, "author").await,
            ),
            "publicationAuthorDelete" => (
                "PublicationAuthorResult",
                delete::<Author>(ctx, args).await,
            ),
            "publicationAuthorPurge" => (
                "PublicationAuthorResult",
                purge::<Author>(ctx, args).await,
            ),
            "publicationSubjectInsert" => (
                "PublicationSubjectResult",
                insert::<SubjectLinkInsert>(ctx, args, "link").await,
            ),
            "publicationSubjectDelete" => (
                "PublicationSubjectResult",
                delete::<SubjectLink>(ctx, args).await,
            ),
            "publicationSubjectPurge" => (
                "PublicationSubjectResult",
                purge::<SubjectLink>(ctx, args).await,
            ),
            _ => return Err(unknown_edge("Mutation", edge)),
        };
        Ok(result_node(result_type, result))
    }
}

const RESULT_TYPES: [(&str, &[Edge]); 5] = [
    (
        "PublicationResult",
        &[edge("publication", <Publication as Entity>::TYPE_NAME)],
    ),
    (
        "PublicationTypeResult",
        &[edge("publicationType", <PublicationType as Entity>::TYPE_NAME)],
    ),
    (
        "PublicationCategoryResult",
        &[edge(
            "publicationCategory",
            <PublicationCategory as Entity>::TYPE_NAME,
        )],
    ),
    (
        "PublicationAuthorResult",
        &[edge("author", <Author as Entity>::TYPE_NAME)],
    ),
    (
        "PublicationSubjectResult",
        &[edge("link", <SubjectLink as Entity>::TYPE_NAME)],
    ),
];

/// `<Entity>Result` objects returned by mutations. The entity edge is a
/// lazy handle and is `null` when the mutation did not succeed.
pub struct ResultObject {
    name: &'static str,
    edges: &'static [Edge],
}

impl ResultObject {
    pub fn all() -> Vec<ResultObject> {
        RESULT_TYPES
            .iter()
            .map(|&(name, edges)| ResultObject { name, edges })
            .collect()
    }
}

#[async_trait]
impl ObjectType for ResultObject {
    fn name(&self) -> &'static str {
        self.name
    }

    fn edges(&self) -> &'static [Edge] {
        self.edges
    }

    async fn resolve_edge(
        &self,
        _ctx: &Arc<RequestContext>,
        object: &Object,
        edge: &str,
        _args: &Args,
    ) -> Result<Node, ResolveError> {
        let Some(target) = self.edges.iter().find(|known| known.name == edge) else {
            return Err(unknown_edge(self.name, edge));
        };
        let succeeded =
            object.payload.get("status") == Some(&Value::String(MutationStatus::Ok.as_str().into()));
        Ok(match object.id {
            Some(id) if succeeded => Node::Object(Object::entity(target.target, id)),
            _ => Node::Null,
        })
    }
}
