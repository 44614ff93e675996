//! Local user adapter backed by the account database files.
//!
//! Only accounts whose uid falls in the managed range are loaded, written or
//! removed. A desired user that already exists outside the range (root, for
//! instance) is rejected before any file is touched.
//!
//! The three database files are replaced in one [`swap::Transaction`].
//! Home directories and key files are provisioned afterwards; see
//! [`provision`].

pub mod passwd;
pub mod provision;

pub use passwd::{GroupEntry, PasswdEntry, Record, ShadowEntry, Table};
pub use provision::{KeyFile, ProvisionFailure, ProvisionReport};

use crate::error::{Error, Result};
use crate::swap;
use reconcile::{Adapter, Collection, LocalUser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// GECOS field of accounts created here.
pub const DEFAULT_GECOS: &str = "ietf-system user";
/// Login shell of accounts created here.
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Where the account database and home directories live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AccountPaths {
    pub passwd: PathBuf,
    pub shadow: PathBuf,
    pub group: PathBuf,
    pub home_base: PathBuf,
    pub skel: PathBuf,
}

impl Default for AccountPaths {
    fn default() -> Self {
        Self {
            passwd: PathBuf::from("/etc/passwd"),
            shadow: PathBuf::from("/etc/shadow"),
            group: PathBuf::from("/etc/group"),
            home_base: PathBuf::from("/home"),
            skel: PathBuf::from("/etc/skel"),
        }
    }
}

impl AccountPaths {
    /// All paths below `root`, e.g. a scratch directory.
    pub fn under(root: &Path) -> Self {
        Self {
            passwd: root.join("etc/passwd"),
            shadow: root.join("etc/shadow"),
            group: root.join("etc/group"),
            home_base: root.join("home"),
            skel: root.join("etc/skel"),
        }
    }
}

/// Inclusive uid/gid range of managed accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidRange {
    pub min: u32,
    pub max: u32,
}

impl Default for UidRange {
    fn default() -> Self {
        Self {
            min: 1000,
            max: 65533,
        }
    }
}

impl UidRange {
    pub fn contains(&self, id: u32) -> bool {
        (self.min..=self.max).contains(&id)
    }

    /// One past the highest id in use within the range.
    fn next(&self, in_use: impl Iterator<Item = u32>) -> Result<u32> {
        let next = in_use
            .filter(|id| self.contains(*id))
            .max()
            .map_or(self.min, |highest| highest + 1);
        if next > self.max {
            return Err(Error::IdsExhausted {
                min: self.min,
                max: self.max,
            });
        }
        Ok(next)
    }
}

/// A user whose account record was written in this store.
struct Placed {
    name: String,
    uid: u32,
    gid: u32,
    home: PathBuf,
    created: bool,
}

/// Local users in `/etc/passwd`, `/etc/shadow` and `/etc/group`.
pub struct LocalAccounts {
    paths: AccountPaths,
    range: UidRange,
    label: String,
}

impl LocalAccounts {
    pub fn new(paths: AccountPaths) -> Self {
        Self {
            label: paths.passwd.display().to_string(),
            paths,
            range: UidRange::default(),
        }
    }

    pub fn with_range(mut self, range: UidRange) -> Self {
        self.range = range;
        self
    }

    pub fn paths(&self) -> &AccountPaths {
        &self.paths
    }

    fn home_for(&self, name: &str) -> PathBuf {
        if name == "root" {
            PathBuf::from("/root")
        } else {
            self.paths.home_base.join(name)
        }
    }

    /// Write `desired` and provision homes and keys.
    ///
    /// Fails only if the account records could not be committed; later
    /// provisioning problems are listed in the report.
    pub fn store_with_report(&self, desired: &Collection<LocalUser>) -> Result<ProvisionReport> {
        let passwd_text = swap::read_or_empty(&self.paths.passwd)?;
        let shadow_text = swap::read_or_empty(&self.paths.shadow)?;
        let group_text = swap::read_or_empty(&self.paths.group)?;
        let mut passwd = Table::<PasswdEntry>::parse(&passwd_text, &self.paths.passwd)?;
        let mut shadow = Table::<ShadowEntry>::parse(&shadow_text, &self.paths.shadow)?;
        let mut group = Table::<GroupEntry>::parse(&group_text, &self.paths.group)?;

        if let Some(entry) = passwd.records().find(|e| {
            !self.range.contains(e.uid) && desired.find(&e.name).is_some()
        }) {
            return Err(Error::Unmanaged {
                name: entry.name.clone(),
                uid: entry.uid,
            });
        }

        let mut placed = Vec::with_capacity(desired.len());
        for user in desired {
            placed.push(self.place(user, &mut passwd, &mut group)?);
            set_password(&mut shadow, user);
        }

        let removed: Vec<PasswdEntry> = passwd
            .records()
            .filter(|e| self.range.contains(e.uid) && desired.find(&e.name).is_none())
            .cloned()
            .collect();
        for entry in &removed {
            log::info!("removing account '{}'", entry.name);
            passwd.retain(|e| e.name != entry.name);
            shadow.retain(|s| s.name != entry.name);
            group.retain(|g| !(g.name == entry.name && g.gid == entry.gid));
            for g in group.records_mut() {
                g.members.retain(|m| *m != entry.name);
            }
        }

        let mut tx = swap::Transaction::new();
        for (path, before, after, mode) in [
            (&self.paths.passwd, &passwd_text, passwd.render(), swap::NEW_FILE_MODE),
            (&self.paths.shadow, &shadow_text, shadow.render(), swap::PRIVATE_FILE_MODE),
            (&self.paths.group, &group_text, group.render(), swap::NEW_FILE_MODE),
        ] {
            if *before != after {
                tx.stage_with_mode(path, after, mode);
            }
        }
        if tx.is_empty() {
            log::debug!("{}: account records unchanged", self.label);
        } else {
            tx.commit()?;
        }

        let mut report = ProvisionReport::default();
        for (user, placed) in desired.iter().zip(&placed) {
            self.provision(user, placed, &mut report);
        }
        for entry in &removed {
            let home = Path::new(&entry.home);
            if let Some(true) =
                report.record(&entry.name, "remove home", provision::remove_home(home, &self.paths.home_base))
            {
                report.homes_removed.push(entry.name.clone());
            }
        }
        Ok(report)
    }

    /// Find or create the account record of `user`.
    fn place(
        &self,
        user: &LocalUser,
        passwd: &mut Table<PasswdEntry>,
        group: &mut Table<GroupEntry>,
    ) -> Result<Placed> {
        if let Some(entry) = passwd.find(&user.name) {
            return Ok(Placed {
                name: entry.name.clone(),
                uid: entry.uid,
                gid: entry.gid,
                home: PathBuf::from(&entry.home),
                created: false,
            });
        }

        let uid = self.range.next(passwd.records().map(|e| e.uid))?;
        let gid = match group.find(&user.name) {
            Some(existing) => existing.gid,
            None => {
                let gid = self.range.next(group.records().map(|g| g.gid))?;
                group.push(GroupEntry {
                    name: user.name.clone(),
                    password: "x".to_string(),
                    gid,
                    members: vec![user.name.clone()],
                });
                gid
            }
        };
        let home = self.home_for(&user.name);
        log::info!("adding account '{}' (uid {uid}, gid {gid})", user.name);
        passwd.push(PasswdEntry {
            name: user.name.clone(),
            password: "x".to_string(),
            uid,
            gid,
            gecos: DEFAULT_GECOS.to_string(),
            home: home.display().to_string(),
            shell: DEFAULT_SHELL.to_string(),
        });

        Ok(Placed {
            name: user.name.clone(),
            uid,
            gid,
            home,
            created: true,
        })
    }

    fn provision(&self, user: &LocalUser, placed: &Placed, report: &mut ProvisionReport) {
        let name = &placed.name;
        if placed.created {
            let result =
                provision::create_home(&placed.home, &self.paths.skel, placed.uid, placed.gid);
            if let Some(true) = report.record(name, "create home", result) {
                report.homes_created.push(name.clone());
            }
        }

        if !placed.home.is_dir() {
            if !user.authorized_keys.is_empty() {
                report.record::<()>(
                    name,
                    "authorized keys",
                    Err(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("home {} does not exist", placed.home.display()),
                    )
                    .into()),
                );
            }
            return;
        }

        let current = report.record(
            name,
            "authorized keys",
            provision::read_authorized_keys(&placed.home),
        );
        if current.as_ref() == Some(&user.authorized_keys) {
            return;
        }
        let result = provision::write_authorized_keys(
            &placed.home,
            &user.authorized_keys,
            placed.uid,
            placed.gid,
        );
        if let Some(true) = report.record(name, "authorized keys", result) {
            report.key_files.push(name.clone());
        }
    }
}

/// Bring the shadow hash of `user` in line with its password.
fn set_password(shadow: &mut Table<ShadowEntry>, user: &LocalUser) {
    let wanted = user.password.as_deref();
    match shadow.find_mut(&user.name) {
        Some(entry) if entry.password() == wanted => {}
        Some(entry) => {
            entry.hash = wanted.unwrap_or(ShadowEntry::LOCKED).to_string();
        }
        None => shadow.push(ShadowEntry::new(user.name.clone(), wanted)),
    }
}

impl Adapter<LocalUser> for LocalAccounts {
    fn name(&self) -> &str {
        &self.label
    }

    fn load(&self) -> reconcile::Result<Collection<LocalUser>> {
        let passwd = Table::<PasswdEntry>::load(&self.paths.passwd)?;
        let shadow = Table::<ShadowEntry>::load(&self.paths.shadow)?;

        let mut users = Collection::new();
        for entry in passwd.records().filter(|e| self.range.contains(e.uid)) {
            let mut user = LocalUser::new(entry.name.clone());
            user.password = shadow
                .find(&entry.name)
                .and_then(ShadowEntry::password)
                .map(str::to_string);
            user.authorized_keys = provision::read_authorized_keys(Path::new(&entry.home))?;
            users.upsert(user);
        }
        Ok(users)
    }

    fn store(&self, collection: &Collection<LocalUser>) -> reconcile::Result<()> {
        let report = self.store_with_report(collection)?;
        log::debug!(
            "{}: {} homes created, {} removed, {} key files written",
            self.label,
            report.homes_created.len(),
            report.homes_removed.len(),
            report.key_files.len()
        );
        for failure in &report.failures {
            log::warn!(
                "provisioning '{}' incomplete ({}): {}",
                failure.user,
                failure.step,
                failure.message
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconcile::{AuthorizedKey, ChangeEvent, CheckStatus, Phase, Subscription, check};
    use std::fs;
    use tempfile::TempDir;

    const DATA: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIGJvZ3VzLWtleS1mb3ItdGVzdHM=";

    const PASSWD: &str = "root:x:0:0:root:/root:/bin/bash\n\
                          daemon:x:1:1:daemon:/usr/sbin:/usr/sbin/nologin\n";
    const SHADOW: &str = "root:*:19000:0:99999:7:::\n\
                          daemon:*:19000:0:99999:7:::\n";
    const GROUP: &str = "root:x:0:\n\
                         wheel:x:10:\n";

    fn setup() -> (TempDir, LocalAccounts) {
        let dir = TempDir::new().unwrap();
        let paths = AccountPaths::under(dir.path());
        fs::create_dir_all(paths.skel.clone()).unwrap();
        fs::create_dir_all(&paths.home_base).unwrap();
        fs::write(&paths.passwd, PASSWD).unwrap();
        fs::write(&paths.shadow, SHADOW).unwrap();
        fs::write(&paths.group, GROUP).unwrap();
        fs::write(paths.skel.join(".profile"), "# profile\n").unwrap();
        (dir, LocalAccounts::new(paths))
    }

    fn alice() -> LocalUser {
        LocalUser::new("alice")
            .with_password("$6$salt$hash")
            .with_key(
                AuthorizedKey::new("laptop")
                    .with_algorithm("ssh-ed25519")
                    .with_data(DATA),
            )
    }

    fn users(list: impl IntoIterator<Item = LocalUser>) -> Collection<LocalUser> {
        list.into_iter().collect()
    }

    #[test]
    fn test_system_accounts_are_not_loaded() {
        let (_dir, accounts) = setup();
        assert!(accounts.load().unwrap().is_empty());
    }

    #[test]
    fn test_create_user() {
        let (_dir, accounts) = setup();
        let desired = users([alice()]);

        let report = accounts.store_with_report(&desired).unwrap();

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(report.homes_created, vec!["alice"]);
        assert_eq!(report.key_files, vec!["alice"]);

        let paths = accounts.paths();
        let home = paths.home_base.join("alice");
        let passwd = fs::read_to_string(&paths.passwd).unwrap();
        assert!(passwd.ends_with(&format!(
            "alice:x:1000:1000:ietf-system user:{}:/bin/bash\n",
            home.display()
        )));
        let shadow = fs::read_to_string(&paths.shadow).unwrap();
        assert!(shadow.ends_with("alice:$6$salt$hash::0:99999:7:::\n"));
        let group = fs::read_to_string(&paths.group).unwrap();
        assert!(group.ends_with("alice:x:1000:alice\n"));
        assert!(home.join(".profile").exists());

        assert_eq!(accounts.load().unwrap(), desired);
        assert!(matches!(check(&desired, &accounts), CheckStatus::Equal));
    }

    #[test]
    fn test_store_twice_changes_nothing() {
        let (_dir, accounts) = setup();
        let desired = users([alice()]);
        accounts.store(&desired).unwrap();
        let passwd_before = fs::read_to_string(&accounts.paths().passwd).unwrap();

        let report = accounts.store_with_report(&desired).unwrap();

        assert!(report.homes_created.is_empty());
        assert!(report.key_files.is_empty());
        assert_eq!(
            fs::read_to_string(&accounts.paths().passwd).unwrap(),
            passwd_before
        );
    }

    #[test]
    fn test_ids_follow_highest_in_range() {
        let (_dir, accounts) = setup();
        accounts
            .store(&users([alice(), LocalUser::new("bob")]))
            .unwrap();

        let passwd = Table::<PasswdEntry>::load(&accounts.paths().passwd).unwrap();
        assert_eq!(passwd.find("bob").unwrap().uid, 1001);
        let shadow = Table::<ShadowEntry>::load(&accounts.paths().shadow).unwrap();
        assert_eq!(shadow.find("bob").unwrap().hash, "!");
    }

    #[test]
    fn test_ids_exhausted() {
        let (_dir, accounts) = setup();
        let accounts = accounts.with_range(UidRange { min: 1000, max: 1000 });
        let err = accounts
            .store_with_report(&users([alice(), LocalUser::new("bob")]))
            .unwrap_err();
        assert!(matches!(err, Error::IdsExhausted { min: 1000, max: 1000 }));
        assert_eq!(
            fs::read_to_string(&accounts.paths().passwd).unwrap(),
            PASSWD
        );
    }

    #[test]
    fn test_remove_user() {
        let (_dir, accounts) = setup();
        accounts
            .store(&users([alice(), LocalUser::new("bob")]))
            .unwrap();
        let mut group = Table::<GroupEntry>::load(&accounts.paths().group).unwrap();
        group.find_mut("wheel").unwrap().members = vec!["alice".into(), "bob".into()];
        fs::write(&accounts.paths().group, group.render()).unwrap();

        let report = accounts
            .store_with_report(&users([LocalUser::new("bob")]))
            .unwrap();

        assert_eq!(report.homes_removed, vec!["alice"]);
        assert!(!accounts.paths().home_base.join("alice").exists());
        assert_eq!(accounts.load().unwrap().keys(), vec!["bob"]);
        let group = Table::<GroupEntry>::load(&accounts.paths().group).unwrap();
        assert!(group.find("alice").is_none());
        assert_eq!(group.find("wheel").unwrap().members, vec!["bob"]);
        assert!(fs::read_to_string(&accounts.paths().shadow)
            .unwrap()
            .lines()
            .all(|l| !l.starts_with("alice:")));
    }

    #[test]
    fn test_system_account_is_never_rewritten() {
        let (_dir, accounts) = setup();
        let shadow = "root:$6$rootsalt$roothash:19000:0:99999:7:::\n\
                      daemon:*:19000:0:99999:7:::\n";
        fs::write(&accounts.paths().shadow, shadow).unwrap();

        for desired in [
            users([LocalUser::new("root")]),
            users([alice(), LocalUser::new("daemon")]),
        ] {
            let err = accounts.store_with_report(&desired).unwrap_err();
            assert!(matches!(err, Error::Unmanaged { .. }), "{err}");
            assert!(accounts.store(&desired).is_err());
        }

        assert_eq!(fs::read_to_string(&accounts.paths().shadow).unwrap(), shadow);
        assert_eq!(fs::read_to_string(&accounts.paths().passwd).unwrap(), PASSWD);
        assert!(!accounts.paths().home_base.join("alice").exists());
    }

    #[test]
    fn test_key_removal_through_subscription() {
        let (_dir, accounts) = setup();
        accounts.store(&users([alice()])).unwrap();
        let paths = accounts.paths().clone();
        let mut sub = Subscription::new(Box::new(accounts));

        sub.handle(
            Phase::Change,
            &[ChangeEvent::deleted(
                "/ietf-system:system/authentication/user[name='alice']/authorized-key[name='laptop']/name",
                "laptop",
            )],
        )
        .unwrap();
        sub.handle(Phase::Done, &[]).unwrap();

        let keys = provision::read_authorized_keys(&paths.home_base.join("alice")).unwrap();
        assert!(keys.is_empty());
        let live = LocalAccounts::new(paths).load().unwrap();
        assert_eq!(live.find("alice").unwrap().password.as_deref(), Some("$6$salt$hash"));
    }
}
