//! Request opcodes for the control channel.
//!
//! Each opcode maps to exactly one leaf operation on the client.

/// Close the session. Sent without waiting for a response.
pub const GOODBYE: u16 = 0;
/// Home node of a user (empty name = caller).
pub const GET_HOME: u16 = 1;
/// Children of a directory node.
pub const LIST_DIRECTORY: u16 = 2;
/// Parent of a node; empty body for home roots.
pub const GET_PARENT: u16 = 3;
/// Create a file or directory under a parent.
pub const MAKE_NODE: u16 = 4;
/// Owner name of a node.
pub const GET_NODE_OWNER: u16 = 5;
/// Open a file descriptor on a node.
pub const FD_OPEN: u16 = 6;
/// Close a file descriptor.
pub const FD_CLOSE: u16 = 7;
/// Short read through a descriptor (one frame).
pub const FD_READ: u16 = 8;
/// Short write through a descriptor (one frame).
pub const FD_WRITE: u16 = 9;
/// Type, size and rights of a node.
pub const GET_NODE_INFO: u16 = 10;
/// Bulk read: switches the link to raw mode.
pub const FD_READ_LONG: u16 = 11;
/// Bulk write: switches the link to raw mode.
pub const FD_WRITE_LONG: u16 = 12;
pub const SET_NODE_RIGHTS: u16 = 13;
pub const GET_NODE_GROUP: u16 = 14;
pub const SET_NODE_GROUP: u16 = 15;
pub const DELETE_NODE: u16 = 16;
/// Members of the caller's group.
pub const GROUP_LIST: u16 = 17;
pub const GROUP_INVITE: u16 = 18;
pub const GROUP_KICK: u16 = 19;
pub const RENAME_NODE: u16 = 20;
/// Reparent a node.
pub const MOVE_NODE: u16 = 21;
/// Clone a node next to itself under a new name.
pub const COPY_NODE: u16 = 22;

/// Short name of an opcode, for logs and error context.
pub fn name(opcode: u16) -> &'static str {
    match opcode {
        GOODBYE => "goodbye",
        GET_HOME => "get_home",
        LIST_DIRECTORY => "list_directory",
        GET_PARENT => "get_parent",
        MAKE_NODE => "make_node",
        GET_NODE_OWNER => "get_node_owner",
        FD_OPEN => "fd_open",
        FD_CLOSE => "fd_close",
        FD_READ => "fd_read",
        FD_WRITE => "fd_write",
        GET_NODE_INFO => "get_node_info",
        FD_READ_LONG => "fd_read_long",
        FD_WRITE_LONG => "fd_write_long",
        SET_NODE_RIGHTS => "set_node_rights",
        GET_NODE_GROUP => "get_node_group",
        SET_NODE_GROUP => "set_node_group",
        DELETE_NODE => "delete_node",
        GROUP_LIST => "group_list",
        GROUP_INVITE => "group_invite",
        GROUP_KICK => "group_kick",
        RENAME_NODE => "rename_node",
        MOVE_NODE => "move_node",
        COPY_NODE => "copy_node",
        _ => "unknown",
    }
}

/// True for the two opcodes that switch the link into raw mode.
#[inline]
pub fn is_bulk(opcode: u16) -> bool {
    opcode == FD_READ_LONG || opcode == FD_WRITE_LONG
}
