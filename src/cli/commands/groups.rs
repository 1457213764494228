//! Default group bootstrap command handler

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_init_groups(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let groups = store.group_repo();
    let permissions = store.permission_repo();

    let name = &config.accounts.default_group;
    let existed = groups.get_by_name(name).await?.is_some();
    let group = groups.get_or_create(name).await?;

    if existed {
        println!("Group '{}' already exists (id {})", group.name, group.id);
    } else {
        println!("✓ Created group '{}' (id {})", group.name, group.id);
    }

    let mut granted = 0;
    for permission in &config.accounts.default_group_permissions {
        let Some(row) = permissions.find(*permission).await? else {
            println!("  ✗ {permission}: not in the permission table");
            continue;
        };

        if groups.grant(group.id, row.id).await? {
            granted += 1;
            println!("  + {permission} ({})", row.codename);
        } else {
            println!("  = {permission} already granted");
        }
    }

    println!();
    println!(
        "{} permission(s) granted, {} configured",
        granted,
        config.accounts.default_group_permissions.len()
    );

    Ok(())
}
