// Well-known nature types and qualities. Responders are routed on these
// strings, so they must stay stable across peer instances.

// schedules business logic
pub const SCHEDULES: &str = "schedules";
pub const CREATE: &str = "create";
pub const UPDATE: &str = "update";
pub const UPDATE_BY_OBJ_ID_TYPE: &str = "updatebyobjidtype";
pub const UPSERT_BY_OBJ_ID_TYPE: &str = "upsertbyobjidtype";
pub const FIND_BY_ID: &str = "findbyid";
pub const FIND_BY_OBJ_ID_TYPE: &str = "findbyobjidtype";
pub const DELETE: &str = "delete";
pub const DELETE_BY_OBJ_ID_TYPE: &str = "deletebyobjidtype";
pub const FIND: &str = "find";
pub const SYNCHRONIZE: &str = "synchronize";

// database interface
pub const DBINTERFACE: &str = "dbinterface";
pub const DB_INSERT_ONE: &str = "insertone";
pub const DB_UPDATE_ONE: &str = "updateone";
pub const DB_UPDATE_ONE_BY_OBJ_ID_TYPE: &str = "updateonebyobjidtype";
pub const DB_UPSERT_ONE_BY_OBJ_ID_TYPE: &str = "upsertonebyobjidtype";
pub const DB_FIND_BY_ID: &str = "findbyid";
pub const DB_FIND_BY_OBJ_ID_TYPE: &str = "findbyobjidtype";
pub const DB_DELETE_ONE: &str = "deleteone";
pub const DB_DELETE_ONE_BY_OBJ_ID_TYPE: &str = "deleteonebyobjidtype";
pub const DB_FIND: &str = "find";

// messaging plumbing
pub const MESSAGES: &str = "messages";
pub const ACKNOWLEDGE: &str = "acknowledge";
pub const PUBLISH: &str = "publish";
