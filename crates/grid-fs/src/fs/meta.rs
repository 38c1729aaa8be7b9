//! ACL, metadata, principal and ticket operations of the facade.

use std::collections::HashMap;

use grid_wire::connection::Dialer;
use grid_wire::models::{Access, AccessLevel, AnonymousTicket, Meta, User, UserType};
use grid_wire::{GridError, ops};

use crate::fs::{EntryKind, FileSystem};
use crate::paths;

impl<D: Dialer> FileSystem<D> {
    // ── ACLs ────────────────────────────────────────────────────────────

    /// List the access grants on a path of either kind.
    pub async fn list_acls(&self, path: &str) -> Result<Vec<Access>, GridError> {
        match self.stat(path).await?.kind {
            EntryKind::Directory => self.list_dir_acls(path).await,
            EntryKind::File => self.list_file_acls(path).await,
        }
    }

    /// List access grants with every group grant expanded to its members.
    pub async fn list_acls_with_group_users(&self, path: &str) -> Result<Vec<Access>, GridError> {
        match self.stat(path).await?.kind {
            EntryKind::Directory => self.list_dir_acls_with_group_users(path).await,
            EntryKind::File => self.list_file_acls_with_group_users(path).await,
        }
    }

    /// List the access grants on a directory.
    pub async fn list_dir_acls(&self, path: &str) -> Result<Vec<Access>, GridError> {
        let path = paths::normalize(path, &self.account().home_path())?;

        if let Some(accesses) = self.cache.get_dir_acls(&path).await {
            return Ok(accesses);
        }

        let mut conn = self.acquire().await?;
        let result = ops::list_collection_access(&mut conn, &path).await;
        self.give_back(conn).await;
        let accesses = result?;

        self.cache.add_dir_acls(&path, accesses.clone()).await;
        Ok(accesses)
    }

    /// List the access grants on a directory, groups expanded.
    ///
    /// Expanding a very large group means listing all of its members.
    pub async fn list_dir_acls_with_group_users(
        &self,
        path: &str,
    ) -> Result<Vec<Access>, GridError> {
        let accesses = self.list_dir_acls(path).await?;
        self.expand_group_accesses(accesses).await
    }

    /// List the access grants on a file.
    pub async fn list_file_acls(&self, path: &str) -> Result<Vec<Access>, GridError> {
        let path = paths::normalize(path, &self.account().home_path())?;

        if let Some(accesses) = self.cache.get_file_acls(&path).await {
            return Ok(accesses);
        }

        let parent = self.get_collection_entry(paths::dirname(&path)).await?;
        let collection = parent
            .as_collection()
            .cloned()
            .ok_or_else(|| GridError::Server {
                code: 0,
                context: format!("cached entry for {} has no collection record", parent.path),
            })?;

        let mut conn = self.acquire().await?;
        let result =
            ops::list_data_object_access(&mut conn, &collection, paths::basename(&path)).await;
        self.give_back(conn).await;
        let accesses = result?;

        self.cache.add_file_acls(&path, accesses.clone()).await;
        Ok(accesses)
    }

    /// List the access grants on a file, groups expanded.
    pub async fn list_file_acls_with_group_users(
        &self,
        path: &str,
    ) -> Result<Vec<Access>, GridError> {
        let accesses = self.list_file_acls(path).await?;
        self.expand_group_accesses(accesses).await
    }

    /// Replace each group grant with one grant per member, deduplicated by
    /// `(user name, access level)`.
    async fn expand_group_accesses(
        &self,
        accesses: Vec<Access>,
    ) -> Result<Vec<Access>, GridError> {
        let mut by_user: HashMap<(String, AccessLevel), Access> = HashMap::new();

        for access in accesses {
            if access.user_type == UserType::RodsGroup {
                for user in self.list_group_users(&access.user_name).await? {
                    let expanded = Access {
                        path: access.path.clone(),
                        user_name: user.name.clone(),
                        user_zone: user.zone.clone(),
                        user_type: user.user_type,
                        access_level: access.access_level,
                    };
                    by_user.insert((user.name, access.access_level), expanded);
                }
            } else {
                by_user.insert((access.user_name.clone(), access.access_level), access);
            }
        }

        Ok(by_user.into_values().collect())
    }

    // ── Principals ──────────────────────────────────────────────────────

    /// List every group in the zone.
    pub async fn list_groups(&self) -> Result<Vec<User>, GridError> {
        if let Some(groups) = self.cache.get_groups().await {
            return Ok(groups);
        }

        let mut conn = self.acquire().await?;
        let result = ops::list_groups(&mut conn).await;
        self.give_back(conn).await;
        let groups = result?;

        self.cache.add_groups(groups.clone()).await;
        Ok(groups)
    }

    /// List the members of a group.
    pub async fn list_group_users(&self, group: &str) -> Result<Vec<User>, GridError> {
        if let Some(users) = self.cache.get_group_users(group).await {
            return Ok(users);
        }

        let mut conn = self.acquire().await?;
        let result = ops::list_group_users(&mut conn, group).await;
        self.give_back(conn).await;
        let users = result?;

        self.cache.add_group_users(group, users.clone()).await;
        Ok(users)
    }

    /// List the groups a user belongs to.
    pub async fn list_user_groups(&self, user: &str) -> Result<Vec<User>, GridError> {
        if let Some(groups) = self.cache.get_user_groups(user).await {
            return Ok(groups);
        }

        let mut conn = self.acquire().await?;
        let result = async {
            let names = ops::list_user_group_names(&mut conn, user).await?;
            let mut groups = Vec::with_capacity(names.len());
            for name in names {
                groups.push(ops::get_group(&mut conn, &name).await?);
            }
            Ok::<_, GridError>(groups)
        }
        .await;
        self.give_back(conn).await;
        let groups = result?;

        self.cache.add_user_groups(user, groups.clone()).await;
        Ok(groups)
    }

    /// List every user in the zone.
    pub async fn list_users(&self) -> Result<Vec<User>, GridError> {
        if let Some(users) = self.cache.get_users().await {
            return Ok(users);
        }

        let mut conn = self.acquire().await?;
        let result = ops::list_users(&mut conn).await;
        self.give_back(conn).await;
        let users = result?;

        self.cache.add_users(users.clone()).await;
        Ok(users)
    }

    // ── Path metadata ───────────────────────────────────────────────────

    /// List the metadata triples on a path of either kind.
    pub async fn list_metadata(&self, path: &str) -> Result<Vec<Meta>, GridError> {
        let path = paths::normalize(path, &self.account().home_path())?;

        if let Some(metas) = self.cache.get_metadata(&path).await {
            return Ok(metas);
        }

        let metas = if self.exists_dir(&path).await {
            let mut conn = self.acquire().await?;
            let result = ops::list_collection_meta(&mut conn, &path).await;
            self.give_back(conn).await;
            result?
        } else {
            let parent = self.get_collection_entry(paths::dirname(&path)).await?;
            let collection = parent
                .as_collection()
                .cloned()
                .ok_or_else(|| GridError::Server {
                    code: 0,
                    context: format!("cached entry for {} has no collection record", parent.path),
                })?;

            let mut conn = self.acquire().await?;
            let result =
                ops::list_data_object_meta(&mut conn, &collection, paths::basename(&path)).await;
            self.give_back(conn).await;
            result?
        };

        self.cache.add_metadata(&path, metas.clone()).await;
        Ok(metas)
    }

    /// Attach a metadata triple to a path of either kind.
    pub async fn add_metadata(
        &self,
        path: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> Result<(), GridError> {
        let path = paths::normalize(path, &self.account().home_path())?;
        let meta = Meta::new(name, value, units);

        let is_dir = self.exists_dir(&path).await;
        let mut conn = self.acquire().await?;
        let result = if is_dir {
            ops::add_collection_meta(&mut conn, &path, &meta).await
        } else {
            ops::add_data_object_meta(&mut conn, &path, &meta).await
        };
        self.give_back(conn).await;
        result?;

        self.cache.remove_metadata(&path).await;
        Ok(())
    }

    /// Remove a metadata triple from a path of either kind.
    pub async fn delete_metadata(
        &self,
        path: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> Result<(), GridError> {
        let path = paths::normalize(path, &self.account().home_path())?;
        let meta = Meta::new(name, value, units);

        let is_dir = self.exists_dir(&path).await;
        let mut conn = self.acquire().await?;
        let result = if is_dir {
            ops::delete_collection_meta(&mut conn, &path, &meta).await
        } else {
            ops::delete_data_object_meta(&mut conn, &path, &meta).await
        };
        self.give_back(conn).await;
        result?;

        self.cache.remove_metadata(&path).await;
        Ok(())
    }

    /// Find every entry carrying the `(name, value)` metadata pair the
    /// caller can see, collections and data objects alike.
    pub async fn search_by_meta(
        &self,
        name: &str,
        value: &str,
    ) -> Result<Vec<crate::fs::Entry>, GridError> {
        use crate::fs::Entry;

        let mut conn = self.acquire().await?;
        let result = async {
            let collections = ops::search_collections_by_meta(&mut conn, name, value).await?;
            let objects =
                ops::search_data_objects_master_replica_by_meta(&mut conn, name, value).await?;
            Ok::<_, GridError>((collections, objects))
        }
        .await;
        self.give_back(conn).await;
        let (collections, objects) = result?;

        let mut entries = Vec::with_capacity(collections.len() + objects.len());
        for collection in collections {
            entries.push(Entry::from_collection(collection));
        }
        for object in objects {
            if let Some(entry) = Entry::from_data_object(object) {
                entries.push(entry);
            }
        }

        for entry in &entries {
            self.cache.remove_negative_entry(&entry.path).await;
            self.cache.add_entry(entry.clone()).await;
        }
        Ok(entries)
    }

    // ── User metadata ───────────────────────────────────────────────────

    /// Attach a metadata triple to a user.
    pub async fn add_user_metadata(
        &self,
        user: &str,
        name: &str,
        value: &str,
        units: &str,
    ) -> Result<(), GridError> {
        let meta = Meta::new(name, value, units);
        let mut conn = self.acquire().await?;
        let result = ops::add_user_meta(&mut conn, user, &meta).await;
        self.give_back(conn).await;
        result
    }

    /// Remove a user metadata triple, addressed by its catalog id.
    pub async fn delete_user_metadata(
        &self,
        user: &str,
        avu_id: i64,
        name: &str,
        value: &str,
        units: &str,
    ) -> Result<(), GridError> {
        let meta = Meta {
            avu_id,
            ..Meta::new(name, value, units)
        };
        let mut conn = self.acquire().await?;
        let result = ops::delete_user_meta(&mut conn, user, &meta).await;
        self.give_back(conn).await;
        result
    }

    /// List the metadata triples on a user.
    pub async fn list_user_metadata(&self, user: &str) -> Result<Vec<Meta>, GridError> {
        let mut conn = self.acquire().await?;
        let result = ops::list_user_meta(&mut conn, user).await;
        self.give_back(conn).await;
        result
    }

    // ── Tickets ─────────────────────────────────────────────────────────

    /// Resolve a ticket string into its anonymous-access information.
    pub async fn get_ticket_for_anonymous_access(
        &self,
        ticket: &str,
    ) -> Result<AnonymousTicket, GridError> {
        let mut conn = self.acquire().await?;
        let result = ops::get_ticket_for_anonymous_access(&mut conn, ticket).await;
        self.give_back(conn).await;
        result
    }
}
