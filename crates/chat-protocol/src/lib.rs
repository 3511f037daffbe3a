// chat-protocol: wire framing and typed message bodies for the udp-chat core.
//
// A packet is a fixed 7-byte header followed by a UTF-8 JSON body, possibly
// empty. The header is framed/parsed in `frame`; the JSON body's recognized
// shapes per message `type` live in `body`. See SPEC_FULL.md §3-4.1.

mod body;
mod frame;

pub use body::{
    AckBody, ChtBody, GrpAddBody, GrpHstBody, GrpSubBody, MsgHstBody, MsgRbaBody, RequestBody,
    UsrAddBody, UsrLoginBody, UsrLstBody,
};
pub use frame::{Frame, FrameError, Header, HEADER_LEN};
