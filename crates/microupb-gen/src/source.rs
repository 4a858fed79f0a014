//! Source emitter.
//!
//! Produces the `.upb.c` file: per-message submessage arrays, field record
//! arrays, layout records (with the optional fast-dispatch table), the
//! extension records, and the file record tying it all together.

use std::collections::BTreeMap;

use microupb_core::{CType, Field, FileId, MessageId, Pool};

use crate::ctypes::{banner, mode_tokens, rep_token, size_init, size_init_signed};
use crate::fasttable::{fast_decode_table, table_mask, TableEntry};
use crate::layout::MessageLayout;
use crate::names::{
    extension_layout_name, field_number_order, file_layout_name, header_filename, message_init,
    message_name, EXTENSIONS_INIT, MESSAGES_INIT,
};
use crate::submsg::SubmsgArray;
use crate::tables::{dense_below, descriptor_type_of, ext_mode_of};

pub fn emit_source(pool: &Pool, file_id: FileId, fasttable_enabled: bool) -> String {
    SourceEmitter {
        pool,
        file_id,
        fasttable_enabled,
        out: String::new(),
    }
    .emit()
}

struct SourceEmitter<'a> {
    pool: &'a Pool,
    file_id: FileId,
    fasttable_enabled: bool,
    out: String,
}

impl SourceEmitter<'_> {
    fn put(&mut self, text: &str) {
        self.out.push_str(text);
    }

    fn emit(mut self) -> String {
        let pool = self.pool;
        let file = pool.file(self.file_id);

        self.put(&banner(&file.name));
        self.put(&format!(
            "#include <stddef.h>\n\
             #include \"upb/msg_internal.h\"\n\
             #include \"{}\"\n",
            header_filename(file)
        ));
        for &dep in &file.dependencies {
            self.put(&format!("#include \"{}\"\n", header_filename(pool.file(dep))));
        }
        self.put("\n#include \"upb/port_def.inc\"\n\n");

        let msg_count = self.write_messages();
        let ext_count = self.write_extensions();

        self.put(&format!(
            "const upb_msglayout_file {} = {{\n",
            file_layout_name(file)
        ));
        self.put(&format!(
            "  {},\n",
            if msg_count > 0 { MESSAGES_INIT } else { "NULL" }
        ));
        self.put(&format!(
            "  {},\n",
            if ext_count > 0 { EXTENSIONS_INIT } else { "NULL" }
        ));
        self.put(&format!("  {msg_count},\n"));
        self.put(&format!("  {ext_count},\n"));
        self.put("};\n\n");

        self.put("#include \"upb/port_undef.inc\"\n");
        self.out
    }

    fn write_messages(&mut self) -> usize {
        let messages = self.pool.file_messages(self.file_id);
        if messages.is_empty() {
            return 0;
        }
        for &id in &messages {
            self.write_message(id);
        }
        self.put(&format!(
            "static const upb_msglayout *{}[{}] = {{\n",
            MESSAGES_INIT,
            messages.len()
        ));
        for &id in &messages {
            self.put(&format!("  &{},\n", message_init(self.pool.message(id))));
        }
        self.put("};\n\n");
        messages.len()
    }

    fn write_message(&mut self, id: MessageId) {
        let pool = self.pool;
        let msg = pool.message(id);
        let msg_name = message_name(msg);
        let layout = MessageLayout::new(pool, id);
        let submsgs = SubmsgArray::new(pool, id);

        let mut submsgs_ref = "NULL".to_string();
        if !submsgs.is_empty() {
            let array_name = format!("{msg_name}_submsgs");
            submsgs_ref = format!("&{array_name}[0]");
            self.put(&format!(
                "static const upb_msglayout_sub {array_name}[{}] = {{\n",
                submsgs.len()
            ));
            for sub in submsgs.submsgs() {
                self.put(&format!("  {{.submsg = &{}}},\n", message_init(pool.message(sub))));
            }
            self.put("};\n\n");
        }

        let order = field_number_order(msg);
        let numbers: Vec<u32> = order.iter().map(|&fi| msg.fields[fi].number).collect();
        let mut fields_ref = "NULL".to_string();
        if !order.is_empty() {
            let array_name = format!("{msg_name}__fields");
            fields_ref = format!("&{array_name}[0]");
            self.put(&format!(
                "static const upb_msglayout_field {array_name}[{}] = {{\n",
                order.len()
            ));
            for &fi in &order {
                let field = &msg.fields[fi];
                let submsg_index = if field.ctype() == CType::Message {
                    submsgs.index_of(field)
                } else {
                    0
                };
                self.put("  ");
                self.write_field(
                    field,
                    &size_init(layout.field_offset(field)),
                    &presence_text(msg, &layout, field),
                    submsg_index,
                );
                self.put(",\n");
            }
            self.put("};\n\n");
        }

        let table: Vec<TableEntry> = if self.fasttable_enabled {
            fast_decode_table(pool, id, &layout)
        } else {
            Vec::new()
        };
        let mask = table_mask(table.len());

        let msgext = match ext_mode_of(msg) {
            microupb_runtime::ExtMode::None => "_UPB_MSGEXT_NONE",
            microupb_runtime::ExtMode::Extendable => "_UPB_MSGEXT_EXTENDABLE",
            microupb_runtime::ExtMode::MsgSet => "_UPB_MSGEXT_MSGSET",
        };

        self.put(&format!("const upb_msglayout {} = {{\n", message_init(msg)));
        self.put(&format!("  {submsgs_ref},\n"));
        self.put(&format!("  {fields_ref},\n"));
        self.put(&format!(
            "  {}, {}, {}, {}, {},\n",
            size_init(layout.message_size()),
            order.len(),
            msgext,
            dense_below(&numbers),
            mask,
        ));
        if !table.is_empty() {
            self.put("  UPB_FASTTABLE_INIT({\n");
            for entry in &table {
                self.put(&format!(
                    "    {{0x{:016x}, &{}}},\n",
                    entry.data, entry.function
                ));
            }
            self.put("  }),\n");
        }
        self.put("};\n\n");
    }

    /// One field record: number, offset, presence, submsg index, descriptor
    /// type, mode.
    fn write_field(&mut self, field: &Field, offset: &str, presence: &str, submsg_index: usize) {
        let pool = self.pool;
        self.put(&format!(
            "{{{}, {}, {}, {}, {}, {} | ({} << _UPB_REP_SHIFT)}}",
            field.number,
            offset,
            presence,
            submsg_index,
            descriptor_type_of(pool, field) as u8,
            mode_tokens(pool, field),
            rep_token(pool, field),
        ));
    }

    fn write_extensions(&mut self) -> usize {
        let pool = self.pool;
        let exts = pool.file_extensions(self.file_id);
        if exts.is_empty() {
            return 0;
        }

        // Extern declarations for every referenced layout, by full name.
        let mut forward: BTreeMap<&str, MessageId> = BTreeMap::new();
        for ext in &exts {
            forward.insert(&pool.message(ext.containing).full_name, ext.containing);
            if let Some(sub) = ext.message_type {
                forward.insert(&pool.message(sub).full_name, sub);
            }
        }
        for &id in forward.values() {
            self.put(&format!(
                "extern const upb_msglayout {};\n",
                message_init(pool.message(id))
            ));
        }

        for ext in &exts {
            self.write_extension(ext);
        }

        self.put(&format!(
            "\nstatic const upb_msglayout_ext *{}[{}] = {{\n",
            EXTENSIONS_INIT,
            exts.len()
        ));
        for ext in &exts {
            self.put(&format!("  &{},\n", extension_layout_name(pool, ext)));
        }
        self.put("};\n\n");
        exts.len()
    }

    fn write_extension(&mut self, ext: &Field) {
        let pool = self.pool;
        self.put(&format!(
            "const upb_msglayout_ext {} = {{\n  ",
            extension_layout_name(pool, ext)
        ));
        self.write_field(ext, "0", "0", 0);
        self.put(",\n");
        self.put(&format!(
            "  &{},\n",
            message_init(pool.message(ext.containing))
        ));
        match ext.message_type {
            Some(sub) => self.put(&format!(
                "  {{.submsg = &{}}},\n",
                message_init(pool.message(sub))
            )),
            None => self.put("  {.submsg = NULL},\n"),
        }
        self.put("\n};\n");
    }
}

fn presence_text(
    msg: &microupb_core::Message,
    layout: &MessageLayout,
    field: &Field,
) -> String {
    if let Some(index) = layout.hasbit_index(field) {
        debug_assert!(index != 0);
        index.to_string()
    } else if let Some((oi, _)) = field.real_oneof(msg) {
        let case = layout.oneof_case_offset(oi);
        // Negative, to distinguish from hasbit indices.
        size_init_signed(!(case.size32 as i32), !(case.size64 as i32))
    } else {
        "0".to_string()
    }
}
