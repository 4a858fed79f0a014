//! Header emitter.
//!
//! Produces the `.upb.h` file: forward declarations, enum typedefs, and the
//! inline accessor surface (hazzers, getters, setters, mutators) for every
//! message, keyed entirely off the computed layout so the accessors agree
//! with the emitted tables.

use microupb_core::ident::{to_c_ident, to_preproc};
use microupb_core::{CType, Field, FileId, Message, MessageId, Pool};

use crate::ctypes::{
    banner, ctype, ctype_const, field_default, size_init, size_lg2,
};
use crate::layout::MessageLayout;
use crate::names::{
    cross_file_messages, extension_ident_base, extension_layout_name, field_number_order,
    file_layout_name, header_filename, message_init, message_name,
};

/// The self-describing schema gets a constant for the largest `*Options`
/// message, used by the runtime to stack-allocate option scratch space.
const DESCRIPTOR_PROTO: &str = "google/protobuf/descriptor.proto";

pub fn emit_header(pool: &Pool, file_id: FileId) -> String {
    HeaderEmitter {
        pool,
        file_id,
        out: String::new(),
    }
    .emit()
}

struct HeaderEmitter<'a> {
    pool: &'a Pool,
    file_id: FileId,
    out: String,
}

impl HeaderEmitter<'_> {
    fn put(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn emit(mut self) -> String {
        let pool = self.pool;
        let file = pool.file(self.file_id);
        let guard = to_preproc(&file.name);

        self.put(&banner(&file.name));
        self.put(&format!(
            "#ifndef {guard}_UPB_H_\n\
             #define {guard}_UPB_H_\n\n\
             #include \"upb/msg_internal.h\"\n\
             #include \"upb/decode.h\"\n\
             #include \"upb/decode_fast.h\"\n\
             #include \"upb/encode.h\"\n\n"
        ));

        for (i, &dep_index) in file.public_dependencies.iter().enumerate() {
            if i == 0 {
                self.put("/* Public Imports. */\n");
            }
            let dep = pool.file(file.dependencies[dep_index]);
            self.put(&format!("#include \"{}\"\n", header_filename(dep)));
            if i == file.public_dependencies.len() - 1 {
                self.put("\n");
            }
        }

        self.put(
            "#include \"upb/port_def.inc\"\n\
             \n\
             #ifdef __cplusplus\n\
             extern \"C\" {\n\
             #endif\n\
             \n",
        );

        let messages = pool.file_messages(self.file_id);
        let exts = pool.file_extensions(self.file_id);

        // Forward-declare everything defined here.
        for &id in &messages {
            self.put(&format!("struct {};\n", message_name(pool.message(id))));
        }
        for &id in &messages {
            let name = message_name(pool.message(id));
            self.put(&format!("typedef struct {name} {name};\n"));
        }
        for &id in &messages {
            self.put(&format!(
                "extern const upb_msglayout {};\n",
                message_init(pool.message(id))
            ));
        }
        for ext in &exts {
            self.put(&format!(
                "extern const upb_msglayout_ext {};\n",
                extension_layout_name(pool, ext)
            ));
        }

        // Cross-file submessages and extendees, by full name.
        for id in cross_file_messages(pool, &messages, &exts) {
            self.put(&format!("struct {};\n", message_name(pool.message(id))));
        }
        for id in cross_file_messages(pool, &messages, &exts) {
            self.put(&format!(
                "extern const upb_msglayout {};\n",
                message_init(pool.message(id))
            ));
        }

        if !messages.is_empty() {
            self.put("\n");
        }

        for id in pool.file_enums(self.file_id) {
            let desc = pool.enum_(id);
            let mut values: Vec<_> = desc.values.iter().collect();
            values.sort_by_key(|v| v.number);
            self.put("typedef enum {\n");
            for (i, value) in values.iter().enumerate() {
                self.put(&format!(
                    "  {} = {}",
                    to_c_ident(&desc.value_full_name(value)),
                    value.number
                ));
                if i != values.len() - 1 {
                    self.put(",");
                }
                self.put("\n");
            }
            self.put(&format!("}} {};\n\n", to_c_ident(&desc.full_name)));
        }

        self.put("\n");

        for &id in &messages {
            self.message_block(id);
        }
        for ext in &exts {
            self.extension_block(ext);
        }

        self.put(&format!(
            "extern const upb_msglayout_file {};\n\n",
            file_layout_name(file)
        ));

        if file.name == DESCRIPTOR_PROTO {
            self.maxopt_block(&messages);
        }

        self.put(&format!(
            "#ifdef __cplusplus\n\
             }}  /* extern \"C\" */\n\
             #endif\n\
             \n\
             #include \"upb/port_undef.inc\"\n\
             \n\
             #endif  /* {guard}_UPB_H_ */\n"
        ));

        self.out
    }

    fn message_block(&mut self, id: MessageId) {
        let pool = self.pool;
        let msg = pool.message(id);
        let layout = MessageLayout::new(pool, id);
        let m = message_name(msg);

        self.put(&format!("/* {} */\n\n", msg.full_name));

        if !msg.map_entry {
            let init = message_init(msg);
            self.put(&format!(
                "UPB_INLINE {m} *{m}_new(upb_arena *arena) {{\n\
                 \x20 return ({m} *)_upb_msg_new(&{init}, arena);\n\
                 }}\n\
                 UPB_INLINE {m} *{m}_parse(const char *buf, size_t size,\n\
                 \x20                       upb_arena *arena) {{\n\
                 \x20 {m} *ret = {m}_new(arena);\n\
                 \x20 if (!ret) return NULL;\n\
                 \x20 if (!upb_decode(buf, size, ret, &{init}, arena)) return NULL;\n\
                 \x20 return ret;\n\
                 }}\n\
                 UPB_INLINE {m} *{m}_parse_ex(const char *buf, size_t size,\n\
                 \x20                          const upb_extreg *extreg, int options,\n\
                 \x20                          upb_arena *arena) {{\n\
                 \x20 {m} *ret = {m}_new(arena);\n\
                 \x20 if (!ret) return NULL;\n\
                 \x20 if (!_upb_decode(buf, size, ret, &{init}, extreg, options, arena)) {{\n\
                 \x20   return NULL;\n\
                 \x20 }}\n\
                 \x20 return ret;\n\
                 }}\n\
                 UPB_INLINE char *{m}_serialize(const {m} *msg, upb_arena *arena, size_t *len) {{\n\
                 \x20 return upb_encode(msg, &{init}, arena, len);\n\
                 }}\n\
                 \n"
            ));
        }

        // Oneof case enums and accessors.
        for (oi, oneof) in msg.oneofs.iter().enumerate() {
            if oneof.synthetic {
                continue;
            }
            let fullname = to_c_ident(&oneof.full_name);
            self.put("typedef enum {\n");
            for field in msg.fields.iter().filter(|f| f.oneof == Some(oi)) {
                self.put(&format!("  {fullname}_{} = {},\n", field.name, field.number));
            }
            self.put(&format!(
                "  {fullname}_NOT_SET = 0\n}} {fullname}_oneofcases;\n"
            ));
            self.put(&format!(
                "UPB_INLINE {fullname}_oneofcases {m}_{}_case(const {m}* msg) {{ \
                 return ({fullname}_oneofcases)*UPB_PTR_AT(msg, {}, int32_t); }}\n\n",
                oneof.name,
                size_init(layout.oneof_case_offset(oi)),
            ));
        }

        for &fi in &field_number_order(msg) {
            self.const_accessors(msg, &layout, &msg.fields[fi]);
        }
        self.put("\n");
        for &fi in &field_number_order(msg) {
            self.mutators(msg, &layout, &msg.fields[fi]);
        }
        self.put("\n");
    }

    fn const_accessors(&mut self, msg: &Message, layout: &MessageLayout, field: &Field) {
        let pool = self.pool;
        let m = message_name(msg);
        let f = &field.name;

        // Hazzer.
        if let Some(index) = layout.hasbit_index(field) {
            self.put(&format!(
                "UPB_INLINE bool {m}_has_{f}(const {m} *msg) {{ \
                 return _upb_hasbit(msg, {index}); }}\n"
            ));
        } else if let Some((oi, _)) = field.real_oneof(msg) {
            self.put(&format!(
                "UPB_INLINE bool {m}_has_{f}(const {m} *msg) {{ \
                 return _upb_getoneofcase(msg, {}) == {}; }}\n",
                size_init(layout.oneof_case_offset(oi)),
                field.number
            ));
        } else if field.ctype() == CType::Message {
            self.put(&format!(
                "UPB_INLINE bool {m}_has_{f}(const {m} *msg) {{ \
                 return _upb_has_submsg_nohasbit(msg, {}); }}\n",
                size_init(layout.field_offset(field))
            ));
        }

        // Getter.
        let offset = size_init(layout.field_offset(field));
        if field.is_map(pool) {
            let entry = pool.message(field.message_type.expect("map without entry"));
            let (key, val) = entry.map_key_value();
            self.put(&format!(
                "UPB_INLINE size_t {m}_{f}_size(const {m} *msg) {{\
                 return _upb_msg_map_size(msg, {offset}); }}\n"
            ));
            self.put(&format!(
                "UPB_INLINE bool {m}_{f}_get(const {m} *msg, {} key, {} *val) {{ \
                 return _upb_msg_map_get(msg, {offset}, &key, {}, val, {}); }}\n",
                ctype(pool, key),
                ctype(pool, val),
                map_key_size(key),
                map_val_size_deref(val),
            ));
            self.put(&format!(
                "UPB_INLINE {} {m}_{f}_next(const {m} *msg, size_t* iter) {{ \
                 return ({})_upb_msg_map_next(msg, {offset}, iter); }}\n",
                ctype_const(pool, field),
                ctype_const(pool, field),
            ));
        } else if msg.map_entry {
            self.put(&format!(
                "UPB_INLINE {} {m}_{f}(const {m} *msg) {{\n\
                 \x20 {} ret;\n\
                 \x20 _upb_msg_map_{f}(msg, &ret, {});\n\
                 \x20 return ret;\n\
                 }}\n",
                ctype_const(pool, field),
                ctype(pool, field),
                map_entry_value_size(field),
            ));
        } else if field.is_repeated() {
            self.put(&format!(
                "UPB_INLINE {} const* {m}_{f}(const {m} *msg, size_t *len) {{ \
                 return ({} const*)_upb_array_accessor(msg, {offset}, len); }}\n",
                ctype_const(pool, field),
                ctype_const(pool, field),
            ));
        } else if let Some((oi, _)) = field.real_oneof(msg) {
            self.put(&format!(
                "UPB_INLINE {} {m}_{f}(const {m} *msg) {{ \
                 return UPB_READ_ONEOF(msg, {}, {offset}, {}, {}, {}); }}\n",
                ctype_const(pool, field),
                ctype_const(pool, field),
                size_init(layout.oneof_case_offset(oi)),
                field.number,
                field_default(pool, field),
            ));
        } else {
            self.put(&format!(
                "UPB_INLINE {} {m}_{f}(const {m} *msg) {{ \
                 return *UPB_PTR_AT(msg, {offset}, {}); }}\n",
                ctype_const(pool, field),
                ctype_const(pool, field),
            ));
        }
    }

    fn mutators(&mut self, msg: &Message, layout: &MessageLayout, field: &Field) {
        let pool = self.pool;
        let m = message_name(msg);
        let f = &field.name;
        let offset = size_init(layout.field_offset(field));

        if field.is_map(pool) {
            let entry = pool.message(field.message_type.expect("map without entry"));
            let (key, val) = entry.map_key_value();
            self.put(&format!(
                "UPB_INLINE void {m}_{f}_clear({m} *msg) {{ _upb_msg_map_clear(msg, {offset}); }}\n"
            ));
            self.put(&format!(
                "UPB_INLINE bool {m}_{f}_set({m} *msg, {} key, {} val, upb_arena *a) {{ \
                 return _upb_msg_map_set(msg, {offset}, &key, {}, &val, {}, a); }}\n",
                ctype(pool, key),
                ctype(pool, val),
                map_key_size(key),
                map_val_size(val),
            ));
            self.put(&format!(
                "UPB_INLINE bool {m}_{f}_delete({m} *msg, {} key) {{ \
                 return _upb_msg_map_delete(msg, {offset}, &key, {}); }}\n",
                ctype(pool, key),
                map_key_size(key),
            ));
            self.put(&format!(
                "UPB_INLINE {} {m}_{f}_nextmutable({m} *msg, size_t* iter) {{ \
                 return ({})_upb_msg_map_next(msg, {offset}, iter); }}\n",
                ctype(pool, field),
                ctype(pool, field),
            ));
        } else if field.is_repeated() {
            let ct = ctype(pool, field);
            self.put(&format!(
                "UPB_INLINE {ct}* {m}_mutable_{f}({m} *msg, size_t *len) {{\n\
                 \x20 return ({ct}*)_upb_array_mutable_accessor(msg, {offset}, len);\n\
                 }}\n"
            ));
            self.put(&format!(
                "UPB_INLINE {ct}* {m}_resize_{f}({m} *msg, size_t len, upb_arena *arena) {{\n\
                 \x20 return ({ct}*)_upb_array_resize_accessor2(msg, {offset}, len, {}, arena);\n\
                 }}\n",
                size_lg2(field),
            ));
            if field.ctype() == CType::Message {
                let sub = pool.message(field.message_type.expect("message field without target"));
                let sub_name = message_name(sub);
                self.put(&format!(
                    "UPB_INLINE struct {sub_name}* {m}_add_{f}({m} *msg, upb_arena *arena) {{\n\
                     \x20 struct {sub_name}* sub = (struct {sub_name}*)_upb_msg_new(&{}, arena);\n\
                     \x20 bool ok = _upb_array_append_accessor2(\n\
                     \x20     msg, {offset}, {}, &sub, arena);\n\
                     \x20 if (!ok) return NULL;\n\
                     \x20 return sub;\n\
                     }}\n",
                    message_init(sub),
                    size_lg2(field),
                ));
            } else {
                self.put(&format!(
                    "UPB_INLINE bool {m}_add_{f}({m} *msg, {ct} val, upb_arena *arena) {{\n\
                     \x20 return _upb_array_append_accessor2(msg, {offset}, {}, &val,\n\
                     \x20     arena);\n\
                     }}\n",
                    size_lg2(field),
                ));
            }
        } else {
            // The key of a map entry cannot be mutated after insertion.
            if msg.map_entry && field.name == "key" {
                return;
            }

            let ct = ctype(pool, field);
            self.put(&format!(
                "UPB_INLINE void {m}_set_{f}({m} *msg, {ct} value) {{\n"
            ));
            if msg.map_entry {
                self.put(&format!(
                    "  _upb_msg_map_set_value(msg, &value, {});\n}}\n",
                    map_entry_set_value_size(field, &ct),
                ));
            } else if let Some((oi, _)) = field.real_oneof(msg) {
                self.put(&format!(
                    "  UPB_WRITE_ONEOF(msg, {ct}, {offset}, value, {}, {});\n}}\n",
                    size_init(layout.oneof_case_offset(oi)),
                    field.number,
                ));
            } else {
                if let Some(index) = layout.hasbit_index(field) {
                    self.put(&format!("  _upb_sethas(msg, {index});\n"));
                }
                self.put(&format!("  *UPB_PTR_AT(msg, {offset}, {ct}) = value;\n}}\n"));
            }

            if field.ctype() == CType::Message && !msg.map_entry {
                let sub = pool.message(field.message_type.expect("message field without target"));
                let sub_name = message_name(sub);
                self.put(&format!(
                    "UPB_INLINE struct {sub_name}* {m}_mutable_{f}({m} *msg, upb_arena *arena) {{\n\
                     \x20 struct {sub_name}* sub = (struct {sub_name}*){m}_{f}(msg);\n\
                     \x20 if (sub == NULL) {{\n\
                     \x20   sub = (struct {sub_name}*)_upb_msg_new(&{}, arena);\n\
                     \x20   if (!sub) return NULL;\n\
                     \x20   {m}_set_{f}(msg, sub);\n\
                     \x20 }}\n\
                     \x20 return sub;\n\
                     }}\n",
                    message_init(sub),
                ));
            }
        }
    }

    fn extension_block(&mut self, ext: &Field) {
        let pool = self.pool;
        let base = extension_ident_base(pool, ext);
        let name = &ext.name;
        let host = message_name(pool.message(ext.containing));
        let layout_name = extension_layout_name(pool, ext);

        self.put(&format!(
            "UPB_INLINE bool {base}_has_{name}(const struct {host} *msg) {{ \
             return _upb_msg_getext(msg, &{layout_name}) != NULL; }}\n"
        ));

        if ext.is_repeated() {
            // Repeated extension accessors go through the generic msg API.
        } else if ext.ctype() == CType::Message {
            self.put(&format!(
                "UPB_INLINE {} {base}_{name}(const struct {host} *msg) {{ \
                 const upb_msg_ext *ext = _upb_msg_getext(msg, &{layout_name}); \
                 UPB_ASSERT(ext); return *UPB_PTR_AT(&ext->data, 0, {}); }}\n",
                ctype_const(pool, ext),
                ctype_const(pool, ext),
            ));
        } else {
            self.put(&format!(
                "UPB_INLINE {} {base}_{name}(const struct {host} *msg) {{ \
                 const upb_msg_ext *ext = _upb_msg_getext(msg, &{layout_name}); \
                 return ext ? *UPB_PTR_AT(&ext->data, 0, {}) : {}; }}\n",
                ctype_const(pool, ext),
                ctype_const(pool, ext),
                field_default(pool, ext),
            ));
        }
    }

    /// `_UPB_MAXOPT_SIZE`: the independent maxima of size32 and size64 over
    /// the `*Options` messages.
    fn maxopt_block(&mut self, messages: &[MessageId]) {
        let pool = self.pool;
        let mut max32: Option<(MessageId, u32)> = None;
        let mut max64: Option<(MessageId, u32)> = None;
        for &id in messages {
            if !pool.message(id).name.ends_with("Options") {
                continue;
            }
            let size = MessageLayout::new(pool, id).message_size();
            if max32.is_none() || size.size32 > max32.map(|(_, s)| s).unwrap_or(0) {
                max32 = Some((id, size.size32));
            }
            if max64.is_none() || size.size64 > max64.map(|(_, s)| s).unwrap_or(0) {
                max64 = Some((id, size.size64));
            }
        }
        let (Some((id32, size32)), Some((id64, size64))) = (max32, max64) else {
            return;
        };
        self.put(&format!(
            "/* Max size 32 is {} */\n",
            pool.message(id32).full_name
        ));
        self.put(&format!(
            "/* Max size 64 is {} */\n",
            pool.message(id64).full_name
        ));
        self.put(&format!(
            "#define _UPB_MAXOPT_SIZE UPB_SIZE({size32}, {size64})\n\n"
        ));
    }
}

fn map_key_size(key: &Field) -> &'static str {
    if key.ctype() == CType::String {
        "0"
    } else {
        "sizeof(key)"
    }
}

fn map_val_size(val: &Field) -> &'static str {
    if val.ctype() == CType::String {
        "0"
    } else {
        "sizeof(val)"
    }
}

fn map_val_size_deref(val: &Field) -> &'static str {
    if val.ctype() == CType::String {
        "0"
    } else {
        "sizeof(*val)"
    }
}

fn map_entry_value_size(field: &Field) -> &'static str {
    if field.ctype() == CType::String {
        "0"
    } else {
        "sizeof(ret)"
    }
}

fn map_entry_set_value_size(field: &Field, ct: &str) -> String {
    if field.ctype() == CType::String {
        "0".to_string()
    } else {
        format!("sizeof({ct})")
    }
}
