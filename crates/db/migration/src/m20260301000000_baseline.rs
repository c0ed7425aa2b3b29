use sea_orm_migration::{prelude::*, sea_orm::DatabaseBackend};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .if_not_exists()
                    .table(GeneratedImages::Table)
                    .col(pk_id_col(manager, GeneratedImages::Id))
                    .col(uuid_col(GeneratedImages::Uuid))
                    .col(ColumnDef::new(GeneratedImages::Prompt).text().not_null())
                    .col(
                        ColumnDef::new(GeneratedImages::Style)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GeneratedImages::Url).string().not_null())
                    .col(ColumnDef::new(GeneratedImages::UserId).string().not_null())
                    .col(timestamp_col(GeneratedImages::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generated_images_uuid")
                    .table(GeneratedImages::Table)
                    .col(GeneratedImages::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The gallery only ever scans newest-first.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generated_images_created_at")
                    .table(GeneratedImages::Table)
                    .col(GeneratedImages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_generated_images_created_at")
                    .table(GeneratedImages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_generated_images_uuid")
                    .table(GeneratedImages::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(GeneratedImages::Table).to_owned())
            .await?;

        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum GeneratedImages {
    Table,
    Id,
    Uuid,
    Prompt,
    Style,
    Url,
    UserId,
    CreatedAt,
}
