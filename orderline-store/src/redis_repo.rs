use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use tracing::{debug, info};

use orderline_core::model::require_id;
use orderline_core::{
    CoreResult, IdGenerator, InventoryStore, Item, NewItem, Reservation, ServiceError, UuidGenerator,
};

// KEYS[1] = item hash, ARGV = name, quantity, created_at. Returns 1 if written, 0 if the key exists.
const CREATE_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 1 then
        return 0
    end
    redis.call("HSET", KEYS[1], "name", ARGV[1], "quantity", ARGV[2], "created_at", ARGV[3])
    return 1
"#;

// KEYS[1] = item hash, KEYS[2] = outstanding reservations, ARGV = reservation id, quantity.
// Returns {status, quantity, name, created_at}; status -1 missing, 0 short, 1 reserved.
const RESERVE_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return {-1, 0, "", ""}
    end
    local requested = tonumber(ARGV[2])
    local available = tonumber(redis.call("HGET", KEYS[1], "quantity"))
    local fields = redis.call("HMGET", KEYS[1], "name", "created_at")
    if available < requested then
        return {0, available, fields[1], fields[2]}
    end
    local left = redis.call("HINCRBY", KEYS[1], "quantity", -requested)
    redis.call("HSET", KEYS[2], ARGV[1], requested)
    return {1, left, fields[1], fields[2]}
"#;

// Same keys and reply shape as RESERVE_SCRIPT; status 0 means the reservation is not outstanding.
const COMMIT_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return {-1, 0, "", ""}
    end
    local fields = redis.call("HMGET", KEYS[1], "name", "created_at")
    local quantity = tonumber(redis.call("HGET", KEYS[1], "quantity"))
    if redis.call("HDEL", KEYS[2], ARGV[1]) == 0 then
        return {0, quantity, fields[1], fields[2]}
    end
    return {1, quantity, fields[1], fields[2]}
"#;

const RELEASE_SCRIPT: &str = r#"
    if redis.call("EXISTS", KEYS[1]) == 0 then
        return {-1, 0, "", ""}
    end
    local fields = redis.call("HMGET", KEYS[1], "name", "created_at")
    local held = redis.call("HGET", KEYS[2], ARGV[1])
    if not held then
        local quantity = tonumber(redis.call("HGET", KEYS[1], "quantity"))
        return {0, quantity, fields[1], fields[2]}
    end
    redis.call("HDEL", KEYS[2], ARGV[1])
    local left = redis.call("HINCRBY", KEYS[1], "quantity", tonumber(held))
    return {1, left, fields[1], fields[2]}
"#;

type ScriptReply = (i64, i64, String, String);

/// Inventory kept in Redis hashes: `item:{id}` holds name, quantity and created_at, and
/// `item:{id}:reservations` maps each outstanding reservation id to its quantity.
///
/// Creation, reservation, commit and release each run as one Lua script, which Redis
/// executes without interleaving any other command, so competing reservations on an item
/// are serialized by the server.
#[derive(Clone)]
pub struct RedisInventoryStore {
    client: redis::Client,
    ids: Arc<dyn IdGenerator>,
}

impl RedisInventoryStore {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, ids: Arc::new(UuidGenerator) })
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    fn key(item_id: &str) -> String {
        format!("item:{}", item_id)
    }

    async fn connection(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await.map_err(redis_error)
    }

    fn reservations_key(item_id: &str) -> String {
        format!("item:{}:reservations", item_id)
    }

    async fn run_script(
        &self,
        source: &str,
        item_id: &str,
        reservation_id: &str,
        quantity: Option<i64>,
    ) -> CoreResult<ScriptReply> {
        let mut conn = self.connection().await?;
        let script = redis::Script::new(source);
        let mut invocation = script.key(Self::key(item_id));
        invocation.key(Self::reservations_key(item_id)).arg(reservation_id);
        if let Some(quantity) = quantity {
            invocation.arg(quantity);
        }
        invocation.invoke_async(&mut conn).await.map_err(redis_error)
    }
}

fn redis_error(e: redis::RedisError) -> ServiceError {
    if e.is_io_error() || e.is_timeout() {
        ServiceError::unavailable(format!("redis: {}", e))
    } else {
        ServiceError::internal(format!("redis: {}", e))
    }
}

fn parse_created_at(raw: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ServiceError::internal(format!("bad created_at {:?}: {}", raw, e)))
}

fn item_from_reply(item_id: &str, (_, quantity, name, created_at): ScriptReply) -> CoreResult<Item> {
    Ok(Item {
        id: item_id.to_string(),
        name,
        quantity,
        created_at: parse_created_at(&created_at)?,
    })
}

fn item_from_hash(item_id: &str, mut fields: HashMap<String, String>) -> CoreResult<Item> {
    let mut take = |field: &str| {
        fields
            .remove(field)
            .ok_or_else(|| ServiceError::internal(format!("item {} is missing {}", item_id, field)))
    };
    let name = take("name")?;
    let quantity = take("quantity")?
        .parse::<i64>()
        .map_err(|e| ServiceError::internal(format!("item {} has a bad quantity: {}", item_id, e)))?;
    let created_at = parse_created_at(&take("created_at")?)?;

    Ok(Item { id: item_id.to_string(), name, quantity, created_at })
}

fn not_found(item_id: &str) -> ServiceError {
    ServiceError::not_found(format!("item {} not found", item_id))
}

fn not_outstanding(reservation_id: &str) -> ServiceError {
    ServiceError::not_found(format!("reservation {} is not outstanding", reservation_id))
}

#[async_trait]
impl InventoryStore for RedisInventoryStore {
    async fn create_item(&self, new_item: NewItem) -> CoreResult<Item> {
        new_item.validate()?;
        let item = new_item.into_item(self.ids.next_id());

        let mut conn = self.connection().await?;
        // Never overwrite an existing record on id collision
        let created: i64 = redis::Script::new(CREATE_SCRIPT)
            .key(Self::key(&item.id))
            .arg(&item.name)
            .arg(item.quantity)
            .arg(item.created_at.to_rfc3339())
            .invoke_async(&mut conn)
            .await
            .map_err(redis_error)?;
        if created == 0 {
            return Err(ServiceError::internal(format!("item id {} already in use", item.id)));
        }

        info!("Item created: {} ({}) with quantity {}", item.id, item.name, item.quantity);
        Ok(item)
    }

    async fn get_item(&self, id: &str) -> CoreResult<Item> {
        require_id(id)?;
        let mut conn = self.connection().await?;
        let fields: HashMap<String, String> = conn.hgetall(Self::key(id)).await.map_err(redis_error)?;
        if fields.is_empty() {
            return Err(not_found(id));
        }
        item_from_hash(id, fields)
    }

    async fn reserve_stock(&self, item_id: &str, quantity: i64) -> CoreResult<Reservation> {
        require_id(item_id)?;
        if quantity <= 0 {
            return Err(ServiceError::invalid_input("quantity must be > 0"));
        }

        let reservation_id = self.ids.next_id();
        let reply = self
            .run_script(RESERVE_SCRIPT, item_id, &reservation_id, Some(quantity))
            .await?;
        match reply.0 {
            -1 => Err(not_found(item_id)),
            0 => Err(ServiceError::insufficient_stock(quantity, reply.1)),
            _ => {
                debug!("Reserved {} of {} as {}, {} left", quantity, item_id, reservation_id, reply.1);
                Ok(Reservation {
                    id: reservation_id,
                    quantity,
                    item: item_from_reply(item_id, reply)?,
                })
            }
        }
    }

    async fn commit_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        require_id(item_id)?;
        require_id(reservation_id)?;

        let reply = self.run_script(COMMIT_SCRIPT, item_id, reservation_id, None).await?;
        match reply.0 {
            -1 => Err(not_found(item_id)),
            0 => Err(not_outstanding(reservation_id)),
            _ => {
                debug!("Committed reservation {} on {}", reservation_id, item_id);
                item_from_reply(item_id, reply)
            }
        }
    }

    async fn release_stock(&self, item_id: &str, reservation_id: &str) -> CoreResult<Item> {
        require_id(item_id)?;
        require_id(reservation_id)?;

        let reply = self.run_script(RELEASE_SCRIPT, item_id, reservation_id, None).await?;
        match reply.0 {
            -1 => Err(not_found(item_id)),
            0 => Err(not_outstanding(reservation_id)),
            _ => {
                debug!("Released reservation {} on {}, {} available", reservation_id, item_id, reply.1);
                item_from_reply(item_id, reply)
            }
        }
    }
}
