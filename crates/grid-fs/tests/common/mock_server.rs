//! In-memory grid server speaking the wire protocol over duplex streams.
//!
//! Each dialed connection gets its own serve task and its own descriptor
//! table; the tree behind them is shared. Failure injection drops a
//! connection right before a chosen message type is answered, which the
//! client observes as a broken connection.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::DuplexStream;

use grid_fs::paths;
use grid_wire::codec::{self, Envelope, code, read_envelope, write_envelope, write_envelope_with_error};
use grid_wire::connection::Dialer;
use grid_wire::messages::{self, Whence, msg};
use grid_wire::models::{
    Access, AccessLevel, AnonymousTicket, Collection, DataObject, Meta, Replica, ReplicaStatus,
    User, UserType,
};
use grid_wire::{Account, GridError};

use super::TEST_PASSWORD;

const ZONE: &str = "zone";
const DEFAULT_RESOURCE: &str = "demoResc";

struct CollectionRec {
    id: i64,
    owner: String,
    meta: Vec<Meta>,
    acls: Vec<Access>,
}

struct ObjectRec {
    id: i64,
    owner: String,
    data: Vec<u8>,
    resource: String,
    meta: Vec<Meta>,
    acls: Vec<Access>,
    extra_replicas: Vec<String>,
}

struct GroupRec {
    user: User,
    members: Vec<User>,
}

struct GridTree {
    next_id: i64,
    next_avu: i64,
    collections: BTreeMap<String, CollectionRec>,
    objects: BTreeMap<String, ObjectRec>,
    groups: BTreeMap<String, GroupRec>,
    users: Vec<User>,
    user_meta: BTreeMap<String, Vec<Meta>>,
    tickets: BTreeMap<String, AnonymousTicket>,
}

impl GridTree {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn owner_acl(path: &str, owner: &str) -> Access {
        Access {
            path: path.to_owned(),
            user_name: owner.to_owned(),
            user_zone: ZONE.to_owned(),
            user_type: UserType::RodsUser,
            access_level: AccessLevel::Own,
        }
    }

    fn insert_collection(&mut self, path: &str, owner: &str) {
        let id = self.allocate_id();
        self.collections.insert(
            path.to_owned(),
            CollectionRec {
                id,
                owner: owner.to_owned(),
                meta: Vec::new(),
                acls: vec![Self::owner_acl(path, owner)],
            },
        );
    }

    fn insert_object(&mut self, path: &str, owner: &str, data: Vec<u8>, resource: &str) {
        let id = self.allocate_id();
        let resource = if resource.is_empty() {
            DEFAULT_RESOURCE
        } else {
            resource
        };
        self.objects.insert(
            path.to_owned(),
            ObjectRec {
                id,
                owner: owner.to_owned(),
                data,
                resource: resource.to_owned(),
                meta: Vec::new(),
                acls: vec![Self::owner_acl(path, owner)],
                extra_replicas: Vec::new(),
            },
        );
    }

    fn collection_model(&self, path: &str, rec: &CollectionRec) -> Collection {
        Collection {
            id: rec.id,
            path: path.to_owned(),
            name: paths::basename(path).to_owned(),
            owner: rec.owner.clone(),
            create_time: epoch_time(rec.id),
            modify_time: epoch_time(rec.id),
        }
    }

    fn object_model(&self, path: &str, rec: &ObjectRec) -> DataObject {
        let collection_id = self
            .collections
            .get(paths::dirname(path))
            .map_or(0, |c| c.id);
        let master = Replica {
            number: 0,
            owner: rec.owner.clone(),
            resource: rec.resource.clone(),
            checksum: format!("sha2:{:016x}", fnv(&rec.data)),
            status: ReplicaStatus::Good,
            create_time: epoch_time(rec.id),
            modify_time: epoch_time(rec.id),
        };
        let mut replicas = vec![master];
        for (i, resource) in rec.extra_replicas.iter().enumerate() {
            let mut replica = replicas[0].clone();
            replica.number = (i + 1) as i32;
            replica.resource = resource.clone();
            replicas.push(replica);
        }
        DataObject {
            id: rec.id,
            collection_id,
            path: path.to_owned(),
            name: paths::basename(path).to_owned(),
            size: rec.data.len() as i64,
            replicas,
        }
    }
}

fn epoch_time(id: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000 + id.unsigned_abs())
}

fn fnv(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Shared state of the mock server.
pub struct MockGridState {
    tree: Mutex<GridTree>,
    /// Password the Authenticate message must present.
    pub expected_password: Mutex<String>,
    /// Completed connect ceremonies.
    pub connects: AtomicUsize,
    /// Transaction commits received.
    pub commits: AtomicUsize,
    /// Data requests served (session ceremony excluded).
    requests: AtomicUsize,
    /// When set, the next request of this message type drops the
    /// connection instead of answering.
    fail_once: Mutex<Option<String>>,
    /// Artificial delay before each response.
    pub latency: Mutex<Duration>,
}

impl MockGridState {
    pub fn new() -> Arc<Self> {
        let mut tree = GridTree {
            next_id: 0,
            next_avu: 0,
            collections: BTreeMap::new(),
            objects: BTreeMap::new(),
            groups: BTreeMap::new(),
            users: Vec::new(),
            user_meta: BTreeMap::new(),
            tickets: BTreeMap::new(),
        };
        for path in ["/", "/zone", "/zone/home", "/zone/home/rods"] {
            tree.insert_collection(path, "rods");
        }
        let rods = User {
            id: 1001,
            name: "rods".into(),
            zone: ZONE.into(),
            user_type: UserType::RodsAdmin,
        };
        let anonymous = User {
            id: 1002,
            name: "anonymous".into(),
            zone: ZONE.into(),
            user_type: UserType::RodsUser,
        };
        tree.groups.insert(
            "rodsadmin".into(),
            GroupRec {
                user: User {
                    id: 2001,
                    name: "rodsadmin".into(),
                    zone: ZONE.into(),
                    user_type: UserType::RodsGroup,
                },
                members: vec![rods.clone()],
            },
        );
        tree.users.push(rods);
        tree.users.push(anonymous);

        Arc::new(Self {
            tree: Mutex::new(tree),
            expected_password: Mutex::new(TEST_PASSWORD.to_owned()),
            connects: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            fail_once: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
        })
    }

    /// Number of data requests served so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Drop the connection right before the next `msg_type` request.
    pub fn fail_once(&self, msg_type: &str) {
        *self.fail_once.lock().unwrap() = Some(msg_type.to_owned());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    fn take_fail(&self, msg_type: &str) -> bool {
        let mut slot = self.fail_once.lock().unwrap();
        if slot.as_deref() == Some(msg_type) {
            *slot = None;
            return true;
        }
        false
    }

    // ── Direct state manipulation for tests ─────────────────────────────

    /// Seed a data object, bypassing the protocol (and any client cache).
    pub fn put_object(&self, path: &str, data: Vec<u8>) {
        self.tree
            .lock()
            .unwrap()
            .insert_object(path, "rods", data, DEFAULT_RESOURCE);
    }

    /// Remove a data object behind the client's back.
    pub fn remove_object(&self, path: &str) {
        self.tree.lock().unwrap().objects.remove(path);
    }

    /// Raw object bytes, if the object exists.
    pub fn object_data(&self, path: &str) -> Option<Vec<u8>> {
        self.tree
            .lock()
            .unwrap()
            .objects
            .get(path)
            .map(|rec| rec.data.clone())
    }

    /// Resources carrying a replica of the object (master first).
    pub fn object_replicas(&self, path: &str) -> Vec<String> {
        let tree = self.tree.lock().unwrap();
        tree.objects.get(path).map_or_else(Vec::new, |rec| {
            let mut resources = vec![rec.resource.clone()];
            resources.extend(rec.extra_replicas.iter().cloned());
            resources
        })
    }

    /// Attach a group-typed ACL to a path.
    pub fn grant_group(&self, path: &str, group: &str, level: AccessLevel) {
        let mut tree = self.tree.lock().unwrap();
        let access = Access {
            path: path.to_owned(),
            user_name: group.to_owned(),
            user_zone: ZONE.to_owned(),
            user_type: UserType::RodsGroup,
            access_level: level,
        };
        if let Some(rec) = tree.collections.get_mut(path) {
            rec.acls.push(access);
        } else if let Some(rec) = tree.objects.get_mut(path) {
            rec.acls.push(access);
        }
    }

    pub fn add_ticket(&self, ticket: AnonymousTicket) {
        self.tree
            .lock()
            .unwrap()
            .tickets
            .insert(ticket.name.clone(), ticket);
    }
}

/// Dialer producing duplex streams served by [`MockGridState`].
#[derive(Clone)]
pub struct MockDialer {
    state: Arc<MockGridState>,
}

impl MockDialer {
    pub fn new(state: &Arc<MockGridState>) -> Self {
        Self {
            state: Arc::clone(state),
        }
    }
}

impl Dialer for MockDialer {
    type Stream = DuplexStream;

    async fn dial(&self, _account: &Account) -> Result<DuplexStream, GridError> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(serve_connection(server, Arc::clone(&self.state)));
        Ok(client)
    }
}

struct OpenHandle {
    path: String,
    offset: i64,
}

type DispatchResult = Result<(Vec<u8>, Vec<u8>), (i32, String)>;

async fn serve_connection(mut stream: DuplexStream, state: Arc<MockGridState>) {
    let mut handles: HashMap<i64, OpenHandle> = HashMap::new();
    let mut next_handle: i64 = 0;

    loop {
        let Ok((envelope, _)) = read_envelope(&mut stream).await else {
            return;
        };
        let msg_type = envelope.header.msg_type.clone();

        if state.take_fail(&msg_type) {
            return;
        }
        let latency = *state.latency.lock().unwrap();
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }

        let reply = dispatch(&state, &mut handles, &mut next_handle, &msg_type, &envelope);
        let written = match reply {
            Ok((body, bs)) => write_envelope(&mut stream, &msg_type, 0, &body, &bs).await,
            Err((status, context)) => {
                write_envelope_with_error(&mut stream, &msg_type, status, &[], context.as_bytes(), &[])
                    .await
            }
        };
        if written.is_err() || msg_type == msg::DISCONNECT {
            return;
        }
    }
}

fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, (i32, String)> {
    serde_json::from_slice(&envelope.body)
        .map_err(|e| (code::INVALID_ARGUMENT, format!("bad request body: {e}")))
}

fn ok<T: Serialize>(value: &T) -> DispatchResult {
    Ok((serde_json::to_vec(value).unwrap(), Vec::new()))
}

fn not_found(path: &str) -> (i32, String) {
    (code::NO_SUCH_PATH, format!("no such path {path}"))
}

#[allow(clippy::too_many_lines)]
fn dispatch(
    state: &MockGridState,
    handles: &mut HashMap<i64, OpenHandle>,
    next_handle: &mut i64,
    msg_type: &str,
    envelope: &Envelope,
) -> DispatchResult {
    // Session ceremony first; everything below counts as a data request.
    match msg_type {
        msg::STARTUP => {
            let _req: messages::StartupRequest = decode(envelope)?;
            state.connects.fetch_add(1, Ordering::SeqCst);
            return ok(&messages::StartupResponse {
                negotiation_result: "plain".into(),
            });
        }
        msg::AUTHENTICATE => {
            let req: messages::AuthRequest = decode(envelope)?;
            if req.secret != *state.expected_password.lock().unwrap() {
                return Err((code::AUTH_FAILED, "invalid credentials".into()));
            }
            return ok(&());
        }
        msg::DISCONNECT => return ok(&()),
        msg::COMMIT_TRANSACTION => {
            state.commits.fetch_add(1, Ordering::SeqCst);
            return ok(&());
        }
        _ => {}
    }
    state.requests.fetch_add(1, Ordering::SeqCst);
    let mut tree = state.tree.lock().unwrap();
    let tree = &mut *tree;

    match msg_type {
        msg::GET_COLLECTION => {
            let req: messages::PathRequest = decode(envelope)?;
            let rec = tree.collections.get(&req.path).ok_or_else(|| not_found(&req.path))?;
            ok(&tree.collection_model(&req.path, rec))
        }
        msg::LIST_SUB_COLLECTIONS => {
            let req: messages::PathRequest = decode(envelope)?;
            if !tree.collections.contains_key(&req.path) {
                return Err(not_found(&req.path));
            }
            let children: Vec<Collection> = tree
                .collections
                .iter()
                .filter(|(path, _)| path.as_str() != "/" && paths::dirname(path) == req.path)
                .map(|(path, rec)| tree.collection_model(path, rec))
                .collect();
            ok(&children)
        }
        msg::LIST_DATA_OBJECTS_MASTER_REPLICA => {
            let req: messages::PathRequest = decode(envelope)?;
            if !tree.collections.contains_key(&req.path) {
                return Err(not_found(&req.path));
            }
            let objects: Vec<DataObject> = tree
                .objects
                .iter()
                .filter(|(path, _)| paths::dirname(path) == req.path)
                .map(|(path, rec)| {
                    let mut object = tree.object_model(path, rec);
                    object.replicas.truncate(1);
                    object
                })
                .collect();
            ok(&objects)
        }
        msg::GET_DATA_OBJECT_MASTER_REPLICA => {
            let req: messages::InCollectionRequest = decode(envelope)?;
            let path = paths::join(&req.collection_path, &req.name);
            let rec = tree.objects.get(&path).ok_or_else(|| not_found(&path))?;
            let mut object = tree.object_model(&path, rec);
            object.replicas.truncate(1);
            ok(&object)
        }
        msg::CREATE_COLLECTION => {
            let req: messages::CreateCollectionRequest = decode(envelope)?;
            if tree.collections.contains_key(&req.path) || tree.objects.contains_key(&req.path) {
                return Err((code::ALREADY_EXISTS, format!("{} exists", req.path)));
            }
            if req.recurse {
                let mut ancestors = Vec::new();
                let mut cursor = req.path.as_str();
                while cursor != "/" && !tree.collections.contains_key(cursor) {
                    ancestors.push(cursor.to_owned());
                    cursor = paths::dirname(cursor);
                }
                for path in ancestors.into_iter().rev() {
                    tree.insert_collection(&path, "rods");
                }
            } else {
                if !tree.collections.contains_key(paths::dirname(&req.path)) {
                    return Err(not_found(paths::dirname(&req.path)));
                }
                tree.insert_collection(&req.path, "rods");
            }
            ok(&())
        }
        msg::DELETE_COLLECTION => {
            let req: messages::DeleteCollectionRequest = decode(envelope)?;
            if !tree.collections.contains_key(&req.path) {
                return Err(not_found(&req.path));
            }
            let occupied = tree
                .collections
                .keys()
                .any(|k| k != &req.path && paths::is_descendant_or_self(k, &req.path))
                || tree
                    .objects
                    .keys()
                    .any(|k| paths::is_descendant_or_self(k, &req.path));
            if occupied && !req.recurse {
                return Err((code::COLLECTION_NOT_EMPTY, format!("{} not empty", req.path)));
            }
            tree.collections
                .retain(|k, _| !paths::is_descendant_or_self(k, &req.path));
            tree.objects
                .retain(|k, _| !paths::is_descendant_or_self(k, &req.path));
            ok(&())
        }
        msg::MOVE_COLLECTION => {
            let req: messages::MoveRequest = decode(envelope)?;
            if !tree.collections.contains_key(&req.src) {
                return Err(not_found(&req.src));
            }
            if tree.collections.contains_key(&req.dest) || tree.objects.contains_key(&req.dest) {
                return Err((code::ALREADY_EXISTS, format!("{} exists", req.dest)));
            }
            let moved_collections: Vec<(String, CollectionRec)> = {
                let keys: Vec<String> = tree
                    .collections
                    .keys()
                    .filter(|k| paths::is_descendant_or_self(k, &req.src))
                    .cloned()
                    .collect();
                keys.into_iter()
                    .filter_map(|k| tree.collections.remove(&k).map(|rec| (k, rec)))
                    .collect()
            };
            for (old_path, rec) in moved_collections {
                let new_path = format!("{}{}", req.dest, &old_path[req.src.len()..]);
                tree.collections.insert(new_path, rec);
            }
            let moved_objects: Vec<(String, ObjectRec)> = {
                let keys: Vec<String> = tree
                    .objects
                    .keys()
                    .filter(|k| paths::is_descendant_or_self(k, &req.src))
                    .cloned()
                    .collect();
                keys.into_iter()
                    .filter_map(|k| tree.objects.remove(&k).map(|rec| (k, rec)))
                    .collect()
            };
            for (old_path, rec) in moved_objects {
                let new_path = format!("{}{}", req.dest, &old_path[req.src.len()..]);
                tree.objects.insert(new_path, rec);
            }
            ok(&())
        }
        msg::CREATE_DATA_OBJECT => {
            let req: messages::CreateDataObjectRequest = decode(envelope)?;
            if !tree.collections.contains_key(paths::dirname(&req.path)) {
                return Err(not_found(paths::dirname(&req.path)));
            }
            if let Some(existing) = tree.objects.get_mut(&req.path) {
                if !req.force {
                    return Err((code::ALREADY_EXISTS, format!("{} exists", req.path)));
                }
                existing.data.clear();
            } else {
                tree.insert_object(&req.path, "rods", Vec::new(), &req.resource);
            }
            *next_handle += 1;
            handles.insert(
                *next_handle,
                OpenHandle {
                    path: req.path,
                    offset: 0,
                },
            );
            ok(&messages::OpenReply {
                handle: *next_handle,
                offset: 0,
            })
        }
        msg::OPEN_DATA_OBJECT => {
            let req: messages::OpenDataObjectRequest = decode(envelope)?;
            let offset = match req.mode.as_str() {
                "r" | "r+" | "wo" => {
                    if !tree.objects.contains_key(&req.path) {
                        return Err(not_found(&req.path));
                    }
                    0
                }
                "w" | "w+" => {
                    if !tree.collections.contains_key(paths::dirname(&req.path)) {
                        return Err(not_found(paths::dirname(&req.path)));
                    }
                    if let Some(existing) = tree.objects.get_mut(&req.path) {
                        existing.data.clear();
                    } else {
                        tree.insert_object(&req.path, "rods", Vec::new(), &req.resource);
                    }
                    0
                }
                "a" => {
                    if !tree.objects.contains_key(&req.path) {
                        if !tree.collections.contains_key(paths::dirname(&req.path)) {
                            return Err(not_found(paths::dirname(&req.path)));
                        }
                        tree.insert_object(&req.path, "rods", Vec::new(), &req.resource);
                    }
                    tree.objects[&req.path].data.len() as i64
                }
                other => {
                    return Err((code::INVALID_ARGUMENT, format!("bad open mode {other:?}")));
                }
            };
            *next_handle += 1;
            handles.insert(
                *next_handle,
                OpenHandle {
                    path: req.path,
                    offset,
                },
            );
            ok(&messages::OpenReply {
                handle: *next_handle,
                offset,
            })
        }
        msg::READ_DATA_OBJECT => {
            let req: messages::ReadDataObjectRequest = decode(envelope)?;
            let handle = handles
                .get_mut(&req.handle)
                .ok_or((code::INVALID_ARGUMENT, "unknown descriptor".to_owned()))?;
            let rec = tree
                .objects
                .get(&handle.path)
                .ok_or_else(|| not_found(&handle.path))?;
            let start = (handle.offset.max(0) as usize).min(rec.data.len());
            let end = (start + req.length.max(0) as usize).min(rec.data.len());
            let data = rec.data[start..end].to_vec();
            handle.offset = end as i64;
            Ok((Vec::new(), data))
        }
        msg::WRITE_DATA_OBJECT => {
            let req: messages::WriteDataObjectRequest = decode(envelope)?;
            let handle = handles
                .get_mut(&req.handle)
                .ok_or((code::INVALID_ARGUMENT, "unknown descriptor".to_owned()))?;
            let rec = tree
                .objects
                .get_mut(&handle.path)
                .ok_or_else(|| not_found(&handle.path))?;
            let offset = handle.offset.max(0) as usize;
            let end = offset + envelope.bs.len();
            if rec.data.len() < end {
                rec.data.resize(end, 0);
            }
            rec.data[offset..end].copy_from_slice(&envelope.bs);
            handle.offset = end as i64;
            ok(&())
        }
        msg::SEEK_DATA_OBJECT => {
            let req: messages::SeekDataObjectRequest = decode(envelope)?;
            let handle = handles
                .get_mut(&req.handle)
                .ok_or((code::INVALID_ARGUMENT, "unknown descriptor".to_owned()))?;
            let len = tree
                .objects
                .get(&handle.path)
                .map_or(0, |rec| rec.data.len() as i64);
            let base = match req.whence {
                Whence::Start => 0,
                Whence::Current => handle.offset,
                Whence::End => len,
            };
            handle.offset = (base + req.offset).max(0);
            ok(&messages::SeekReply {
                offset: handle.offset,
            })
        }
        msg::CLOSE_DATA_OBJECT => {
            let req: messages::CloseDataObjectRequest = decode(envelope)?;
            handles
                .remove(&req.handle)
                .ok_or((code::INVALID_ARGUMENT, "unknown descriptor".to_owned()))?;
            ok(&())
        }
        msg::TRUNCATE_DATA_OBJECT => {
            let req: messages::TruncateDataObjectRequest = decode(envelope)?;
            let rec = tree
                .objects
                .get_mut(&req.path)
                .ok_or_else(|| not_found(&req.path))?;
            rec.data.resize(req.size.max(0) as usize, 0);
            ok(&())
        }
        msg::COPY_DATA_OBJECT => {
            let req: messages::CopyRequest = decode(envelope)?;
            let data = tree
                .objects
                .get(&req.src)
                .map(|rec| rec.data.clone())
                .ok_or_else(|| not_found(&req.src))?;
            if !tree.collections.contains_key(paths::dirname(&req.dest)) {
                return Err(not_found(paths::dirname(&req.dest)));
            }
            tree.insert_object(&req.dest, "rods", data, DEFAULT_RESOURCE);
            ok(&())
        }
        msg::REPLICATE_DATA_OBJECT => {
            let req: messages::ReplicateDataObjectRequest = decode(envelope)?;
            let rec = tree
                .objects
                .get_mut(&req.path)
                .ok_or_else(|| not_found(&req.path))?;
            if !req.resource.is_empty() && !rec.extra_replicas.contains(&req.resource) {
                rec.extra_replicas.push(req.resource);
            }
            ok(&())
        }
        msg::MOVE_DATA_OBJECT => {
            let req: messages::MoveRequest = decode(envelope)?;
            if tree.objects.contains_key(&req.dest) || tree.collections.contains_key(&req.dest) {
                return Err((code::ALREADY_EXISTS, format!("{} exists", req.dest)));
            }
            if !tree.collections.contains_key(paths::dirname(&req.dest)) {
                return Err(not_found(paths::dirname(&req.dest)));
            }
            let rec = tree
                .objects
                .remove(&req.src)
                .ok_or_else(|| not_found(&req.src))?;
            tree.objects.insert(req.dest, rec);
            ok(&())
        }
        msg::DELETE_DATA_OBJECT => {
            let req: messages::DeleteDataObjectRequest = decode(envelope)?;
            tree.objects
                .remove(&req.path)
                .ok_or_else(|| not_found(&req.path))?;
            ok(&())
        }
        msg::LIST_COLLECTION_ACCESS => {
            let req: messages::PathRequest = decode(envelope)?;
            let rec = tree.collections.get(&req.path).ok_or_else(|| not_found(&req.path))?;
            ok(&rec.acls)
        }
        msg::LIST_DATA_OBJECT_ACCESS => {
            let req: messages::InCollectionRequest = decode(envelope)?;
            let path = paths::join(&req.collection_path, &req.name);
            let rec = tree.objects.get(&path).ok_or_else(|| not_found(&path))?;
            ok(&rec.acls)
        }
        msg::LIST_COLLECTION_META => {
            let req: messages::PathRequest = decode(envelope)?;
            let rec = tree.collections.get(&req.path).ok_or_else(|| not_found(&req.path))?;
            ok(&rec.meta)
        }
        msg::LIST_DATA_OBJECT_META => {
            let req: messages::InCollectionRequest = decode(envelope)?;
            let path = paths::join(&req.collection_path, &req.name);
            let rec = tree.objects.get(&path).ok_or_else(|| not_found(&path))?;
            ok(&rec.meta)
        }
        msg::ADD_COLLECTION_META | msg::ADD_DATA_OBJECT_META => {
            let req: messages::MetaMutationRequest = decode(envelope)?;
            tree.next_avu += 1;
            let mut meta = req.meta;
            meta.avu_id = tree.next_avu;
            if msg_type == msg::ADD_COLLECTION_META {
                tree.collections
                    .get_mut(&req.path)
                    .ok_or_else(|| not_found(&req.path))?
                    .meta
                    .push(meta);
            } else {
                tree.objects
                    .get_mut(&req.path)
                    .ok_or_else(|| not_found(&req.path))?
                    .meta
                    .push(meta);
            }
            ok(&())
        }
        msg::DELETE_COLLECTION_META | msg::DELETE_DATA_OBJECT_META => {
            let req: messages::MetaMutationRequest = decode(envelope)?;
            let metas = if msg_type == msg::DELETE_COLLECTION_META {
                &mut tree
                    .collections
                    .get_mut(&req.path)
                    .ok_or_else(|| not_found(&req.path))?
                    .meta
            } else {
                &mut tree
                    .objects
                    .get_mut(&req.path)
                    .ok_or_else(|| not_found(&req.path))?
                    .meta
            };
            metas.retain(|m| !(m.name == req.meta.name && m.value == req.meta.value));
            ok(&())
        }
        msg::LIST_GROUPS => {
            let groups: Vec<User> = tree.groups.values().map(|g| g.user.clone()).collect();
            ok(&groups)
        }
        msg::LIST_GROUP_USERS => {
            let req: messages::NameRequest = decode(envelope)?;
            let members = tree
                .groups
                .get(&req.name)
                .map_or_else(Vec::new, |g| g.members.clone());
            ok(&members)
        }
        msg::LIST_USER_GROUP_NAMES => {
            let req: messages::NameRequest = decode(envelope)?;
            let names: Vec<String> = tree
                .groups
                .iter()
                .filter(|(_, g)| g.members.iter().any(|m| m.name == req.name))
                .map(|(name, _)| name.clone())
                .collect();
            ok(&names)
        }
        msg::LIST_USERS => ok(&tree.users),
        msg::GET_GROUP => {
            let req: messages::NameRequest = decode(envelope)?;
            let group = tree.groups.get(&req.name).ok_or_else(|| not_found(&req.name))?;
            ok(&group.user)
        }
        msg::ADD_USER_META => {
            let req: messages::UserMetaRequest = decode(envelope)?;
            tree.next_avu += 1;
            let mut meta = req.meta;
            meta.avu_id = tree.next_avu;
            tree.user_meta.entry(req.user).or_default().push(meta);
            ok(&())
        }
        msg::DELETE_USER_META => {
            let req: messages::UserMetaRequest = decode(envelope)?;
            if let Some(metas) = tree.user_meta.get_mut(&req.user) {
                metas.retain(|m| {
                    if req.meta.avu_id > 0 {
                        m.avu_id != req.meta.avu_id
                    } else {
                        !(m.name == req.meta.name && m.value == req.meta.value)
                    }
                });
            }
            ok(&())
        }
        msg::LIST_USER_META => {
            let req: messages::NameRequest = decode(envelope)?;
            let metas = tree.user_meta.get(&req.name).cloned().unwrap_or_default();
            ok(&metas)
        }
        msg::SEARCH_COLLECTIONS_BY_META => {
            let req: messages::SearchByMetaRequest = decode(envelope)?;
            let matches: Vec<Collection> = tree
                .collections
                .iter()
                .filter(|(_, rec)| {
                    rec.meta
                        .iter()
                        .any(|m| m.name == req.name && m.value == req.value)
                })
                .map(|(path, rec)| tree.collection_model(path, rec))
                .collect();
            ok(&matches)
        }
        msg::SEARCH_DATA_OBJECTS_MASTER_REPLICA_BY_META => {
            let req: messages::SearchByMetaRequest = decode(envelope)?;
            let matches: Vec<DataObject> = tree
                .objects
                .iter()
                .filter(|(_, rec)| {
                    rec.meta
                        .iter()
                        .any(|m| m.name == req.name && m.value == req.value)
                })
                .map(|(path, rec)| {
                    let mut object = tree.object_model(path, rec);
                    object.replicas.truncate(1);
                    object
                })
                .collect();
            ok(&matches)
        }
        msg::GET_TICKET_FOR_ANONYMOUS_ACCESS => {
            let req: messages::NameRequest = decode(envelope)?;
            let ticket = tree.tickets.get(&req.name).ok_or_else(|| not_found(&req.name))?;
            ok(ticket)
        }
        other => Err((
            codec::code::INVALID_ARGUMENT,
            format!("unsupported message type {other:?}"),
        )),
    }
}
